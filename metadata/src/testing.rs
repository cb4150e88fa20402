//! Construction of synthetic metadata blobs for tests.
//!
//! The builder declares types and pallets directly in the wire layout and
//! encodes them exactly like a node would answer `state_getMetadata`, so that
//! tests exercise the real decoding path.

use crate::version::portable::*;
use crate::version::{v14, v15, RuntimeMetadata};
use crate::{BitOrder, StorageHasher};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MetadataBuilder {
    types: Vec<Type>,
    pallets: Vec<v15::PalletMetadata>,
    apis: Vec<v15::RuntimeApiMetadata>,
    signed_extensions: Vec<v14::SignedExtensionMetadata>,
    custom: BTreeMap<String, v15::CustomValueMetadata>,
    primitives: BTreeMap<u8, u32>,
    account_id: Option<u32>,
}

fn fields(fields: &[(Option<&str>, u32)]) -> Vec<Field> {
    fields
        .iter()
        .map(|(name, ty)| Field {
            name: name.map(|s| s.to_string()),
            ty: TypeRef(*ty),
            type_name: None,
            docs: vec![],
        })
        .collect()
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Default::default()
    }
    /// Adds a type and returns its identifier.
    pub fn add(&mut self, path: &[&str], type_def: TypeDef) -> u32 {
        self.types.push(Type {
            path: path.iter().map(|s| s.to_string()).collect(),
            type_params: vec![],
            type_def,
            docs: vec![],
        });
        (self.types.len() - 1) as u32
    }
    /// Reserves an identifier to be filled with [`MetadataBuilder::set`],
    /// for declaring recursive types.
    pub fn reserve(&mut self) -> u32 {
        self.add(&[], TypeDef::Tuple { fields: vec![] })
    }
    pub fn set(&mut self, id: u32, path: &[&str], type_def: TypeDef) {
        let ty = &mut self.types[id as usize];
        ty.path = path.iter().map(|s| s.to_string()).collect();
        ty.type_def = type_def;
    }
    pub fn primitive(&mut self, prim: TypeDefPrimitive) -> u32 {
        let key = prim as u8;
        if let Some(id) = self.primitives.get(&key) {
            return *id;
        }

        let id = self.add(&[], TypeDef::Primitive(prim));
        self.primitives.insert(key, id);
        id
    }
    pub fn composite(&mut self, path: &[&str], f: &[(Option<&str>, u32)]) -> u32 {
        self.add(path, TypeDef::Composite { fields: fields(f) })
    }
    pub fn variant(&mut self, path: &[&str], arms: &[(&str, u8, &[(Option<&str>, u32)])]) -> u32 {
        let variants = arms
            .iter()
            .map(|(name, index, f)| Variant {
                name: name.to_string(),
                fields: fields(f),
                index: *index,
                docs: vec![],
            })
            .collect();

        self.add(path, TypeDef::Variant { variants })
    }
    pub fn option(&mut self, inner: u32) -> u32 {
        self.variant(&["Option"], &[("None", 0, &[]), ("Some", 1, &[(None, inner)])])
    }
    pub fn sequence(&mut self, elem: u32) -> u32 {
        self.add(&[], TypeDef::Sequence {
            type_param: TypeRef(elem),
        })
    }
    pub fn array(&mut self, elem: u32, len: u32) -> u32 {
        self.add(&[], TypeDef::Array {
            len,
            type_param: TypeRef(elem),
        })
    }
    pub fn tuple(&mut self, elems: &[u32]) -> u32 {
        self.add(&[], TypeDef::Tuple {
            fields: elems.iter().map(|id| TypeRef(*id)).collect(),
        })
    }
    pub fn compact(&mut self, inner: u32) -> u32 {
        self.add(&[], TypeDef::Compact {
            type_param: TypeRef(inner),
        })
    }
    pub fn bit_sequence(&mut self, store: u32, order: BitOrder) -> u32 {
        let name = match order {
            BitOrder::Lsb0 => "Lsb0",
            BitOrder::Msb0 => "Msb0",
        };
        let order = self.add(&["bitvec", "order", name], TypeDef::Composite { fields: vec![] });
        self.add(&[], TypeDef::BitSequence {
            bit_store_type: TypeRef(store),
            bit_order_type: TypeRef(order),
        })
    }
    /// `sp_core::crypto::AccountId32`, a newtype around `[u8; 32]`.
    pub fn account_id(&mut self) -> u32 {
        if let Some(id) = self.account_id {
            return id;
        }

        let byte = self.primitive(TypeDefPrimitive::U8);
        let bytes = self.array(byte, 32);
        let id = self.composite(&["sp_core", "crypto", "AccountId32"], &[(None, bytes)]);
        self.account_id = Some(id);
        id
    }
    pub fn pallet(&mut self, name: &str, index: u8) -> PalletBuilder<'_> {
        let pos = self.pallets.len();
        self.pallets.push(v15::PalletMetadata {
            name: name.to_string(),
            storage: None,
            calls: None,
            event: None,
            constants: vec![],
            error: None,
            index,
            docs: vec![],
        });

        PalletBuilder {
            pallet: &mut self.pallets[pos],
        }
    }
    pub fn runtime_api(&mut self, api: &str, method: &str, inputs: &[(&str, u32)], output: u32) {
        let method = v15::RuntimeApiMethodMetadata {
            name: method.to_string(),
            inputs: inputs
                .iter()
                .map(|(name, ty)| v15::RuntimeApiMethodParamMetadata {
                    name: name.to_string(),
                    ty: TypeRef(*ty),
                })
                .collect(),
            output: TypeRef(output),
            docs: vec![],
        };

        match self.apis.iter_mut().find(|a| a.name == api) {
            Some(existing) => existing.methods.push(method),
            None => self.apis.push(v15::RuntimeApiMetadata {
                name: api.to_string(),
                methods: vec![method],
                docs: vec![],
            }),
        }
    }
    pub fn signed_extension(&mut self, identifier: &str, ty: u32, additional_signed: u32) {
        self.signed_extensions.push(v14::SignedExtensionMetadata {
            identifier: identifier.to_string(),
            ty: TypeRef(ty),
            additional_signed: TypeRef(additional_signed),
        });
    }
    pub fn custom(&mut self, name: &str, ty: u32, value: Vec<u8>) {
        self.custom.insert(
            name.to_string(),
            v15::CustomValueMetadata {
                ty: TypeRef(ty),
                value,
            },
        );
    }
    // Declares the envelope types shared by both versions.
    fn envelope(&mut self) -> Envelope {
        let byte = self.primitive(TypeDefPrimitive::U8);
        let account = self.account_id();
        let index = self.primitive(TypeDefPrimitive::U32);
        let compact_index = self.compact(index);
        let raw = self.sequence(byte);
        let bytes32 = self.array(byte, 32);
        let bytes20 = self.array(byte, 20);
        let bytes64 = self.array(byte, 64);
        let bytes65 = self.array(byte, 65);

        let address = self.variant(
            &["sp_runtime", "multiaddress", "MultiAddress"],
            &[
                ("Id", 0, &[(None, account)]),
                ("Index", 1, &[(None, compact_index)]),
                ("Raw", 2, &[(None, raw)]),
                ("Address32", 3, &[(None, bytes32)]),
                ("Address20", 4, &[(None, bytes20)]),
            ],
        );
        let signature = self.variant(
            &["sp_runtime", "MultiSignature"],
            &[
                ("Ed25519", 0, &[(None, bytes64)]),
                ("Sr25519", 1, &[(None, bytes64)]),
                ("Ecdsa", 2, &[(None, bytes65)]),
            ],
        );

        let outer = |b: &mut Self, name: &str, select: fn(&v15::PalletMetadata) -> Option<u32>| {
            let arms: Vec<Variant> = b
                .pallets
                .iter()
                .filter_map(|p| {
                    select(p).map(|ty| Variant {
                        name: p.name.clone(),
                        fields: fields(&[(None, ty)]),
                        index: p.index,
                        docs: vec![],
                    })
                })
                .collect();
            b.add(&["runtime", name], TypeDef::Variant { variants: arms })
        };
        let call = outer(self, "RuntimeCall", |p| p.calls.as_ref().map(|c| c.ty.0));
        let event = outer(self, "RuntimeEvent", |p| p.event.as_ref().map(|e| e.ty.0));
        let error = outer(self, "RuntimeError", |p| p.error.as_ref().map(|e| e.ty.0));

        let extension_types: Vec<u32> = self.signed_extensions.iter().map(|e| e.ty.0).collect();
        let extra = self.tuple(&extension_types);
        let runtime = self.composite(&["runtime", "Runtime"], &[]);

        Envelope {
            address,
            call,
            signature,
            extra,
            event,
            error,
            runtime,
        }
    }
    /// Encodes the declared metadata as a V14 blob, including the magic
    /// number.
    pub fn build_v14(mut self) -> Vec<u8> {
        let env = self.envelope();
        let byte = self.primitive(TypeDefPrimitive::U8);
        let raw = self.sequence(byte);
        let extrinsic_ty = self.composite(
            &["sp_runtime", "generic", "unchecked_extrinsic", "UncheckedExtrinsic"],
            &[(None, raw)],
        );
        self.types[extrinsic_ty as usize].type_params = [
            ("Address", env.address),
            ("Call", env.call),
            ("Signature", env.signature),
            ("Extra", env.extra),
        ]
        .iter()
        .map(|(name, ty)| TypeParameter {
            name: name.to_string(),
            ty: Some(TypeRef(*ty)),
        })
        .collect();

        let meta = v14::RuntimeMetadataV14 {
            types: self.registry(),
            pallets: self
                .pallets
                .into_iter()
                .map(|p| v14::PalletMetadata {
                    name: p.name,
                    storage: p.storage,
                    calls: p.calls,
                    event: p.event,
                    constants: p.constants,
                    error: p.error,
                    index: p.index,
                })
                .collect(),
            extrinsic: v14::ExtrinsicMetadata {
                ty: TypeRef(extrinsic_ty),
                version: 4,
                signed_extensions: self.signed_extensions,
            },
            ty: TypeRef(env.runtime),
        };

        RuntimeMetadata::V14(meta).encode_prefixed()
    }
    /// Encodes the declared metadata as a V15 blob, including the magic
    /// number.
    pub fn build_v15(mut self) -> Vec<u8> {
        let env = self.envelope();

        let meta = v15::RuntimeMetadataV15 {
            types: self.registry(),
            pallets: self.pallets,
            extrinsic: v15::ExtrinsicMetadata {
                version: 4,
                address_ty: TypeRef(env.address),
                call_ty: TypeRef(env.call),
                signature_ty: TypeRef(env.signature),
                extra_ty: TypeRef(env.extra),
                signed_extensions: self.signed_extensions,
            },
            ty: TypeRef(env.runtime),
            apis: self.apis,
            outer_enums: v15::OuterEnums {
                call_enum_ty: TypeRef(env.call),
                event_enum_ty: TypeRef(env.event),
                error_enum_ty: TypeRef(env.error),
            },
            custom: v15::CustomMetadata { map: self.custom },
        };

        RuntimeMetadata::V15(meta).encode_prefixed()
    }
    fn registry(&self) -> PortableRegistry {
        PortableRegistry {
            types: self
                .types
                .iter()
                .enumerate()
                .map(|(id, ty)| PortableType {
                    id: id as u32,
                    ty: ty.clone(),
                })
                .collect(),
        }
    }
}

struct Envelope {
    address: u32,
    call: u32,
    signature: u32,
    extra: u32,
    event: u32,
    error: u32,
    runtime: u32,
}

/// Declares the parts of a single pallet.
pub struct PalletBuilder<'a> {
    pallet: &'a mut v15::PalletMetadata,
}

impl<'a> PalletBuilder<'a> {
    pub fn calls(self, ty: u32) -> Self {
        self.pallet.calls = Some(v14::PalletCallMetadata { ty: TypeRef(ty) });
        self
    }
    pub fn events(self, ty: u32) -> Self {
        self.pallet.event = Some(v14::PalletEventMetadata { ty: TypeRef(ty) });
        self
    }
    pub fn errors(self, ty: u32) -> Self {
        self.pallet.error = Some(v14::PalletErrorMetadata { ty: TypeRef(ty) });
        self
    }
    fn entry(&mut self, entry: v14::StorageEntryMetadata) {
        let prefix = self.pallet.name.clone();
        self.pallet
            .storage
            .get_or_insert_with(|| v14::PalletStorageMetadata {
                prefix,
                entries: vec![],
            })
            .entries
            .push(entry);
    }
    pub fn plain_storage(mut self, name: &str, value: u32) -> Self {
        self.entry(v14::StorageEntryMetadata {
            name: name.to_string(),
            modifier: v14::StorageEntryModifier::Optional,
            ty: v14::StorageEntryType::Plain(TypeRef(value)),
            default: vec![],
            docs: vec![],
        });
        self
    }
    pub fn map_storage(mut self, name: &str, hashers: &[StorageHasher], key: u32, value: u32) -> Self {
        self.entry(v14::StorageEntryMetadata {
            name: name.to_string(),
            modifier: v14::StorageEntryModifier::Optional,
            ty: v14::StorageEntryType::Map {
                hashers: hashers.to_vec(),
                key: TypeRef(key),
                value: TypeRef(value),
            },
            default: vec![],
            docs: vec![],
        });
        self
    }
    /// Like [`PalletBuilder::plain_storage`] with the `Default` modifier.
    pub fn default_storage(mut self, name: &str, value: u32, default: Vec<u8>) -> Self {
        self.entry(v14::StorageEntryMetadata {
            name: name.to_string(),
            modifier: v14::StorageEntryModifier::Default,
            ty: v14::StorageEntryType::Plain(TypeRef(value)),
            default,
            docs: vec![],
        });
        self
    }
    pub fn constant(self, name: &str, ty: u32, value: Vec<u8>) -> Self {
        self.pallet.constants.push(v14::PalletConstantMetadata {
            name: name.to_string(),
            ty: TypeRef(ty),
            value,
            docs: vec![],
        });
        self
    }
}
