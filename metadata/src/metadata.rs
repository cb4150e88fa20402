use crate::registry::{Registry, TypeDefinition, TypeId, Variant, WireRegistry};
use crate::version::portable::TypeRef;
use crate::version::{v14, v15, RuntimeMetadata};
use crate::{Error, Result, StorageHasher};
use std::collections::HashMap;

pub use crate::version::v14::StorageEntryModifier;

/// Runtime metadata of a chain, resolved into a [`Registry`] plus direct
/// lookups by name and by on-chain index.
///
/// Constructed once per connection and immutable afterwards. Must be rebuilt
/// when the runtime version of the chain changes.
#[derive(Debug, Clone)]
pub struct Metadata {
    version: u8,
    types: Registry,
    pallets: Vec<PalletMetadata>,
    pallets_by_name: HashMap<String, usize>,
    pallets_by_index: HashMap<u8, usize>,
    extrinsic: ExtrinsicMetadata,
    runtime_ty: TypeId,
    outer_enums: Option<OuterEnums>,
    apis: HashMap<String, RuntimeApiMetadata>,
    custom: HashMap<String, CustomValue>,
}

/// Name and index bijection over the arms of a variant type, used for the
/// calls, events and errors of a pallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantIndex {
    ty: TypeId,
    by_name: HashMap<String, u8>,
    by_index: HashMap<u8, String>,
}

impl VariantIndex {
    fn new(types: &Registry, ty: TypeId, owner: &str) -> Result<Self> {
        let variants = match types.resolve(ty) {
            Some(TypeDefinition::Variant(variants)) => variants,
            _ => {
                return Err(Error::NotAVariant {
                    ty,
                    owner: owner.to_string(),
                })
            }
        };

        Ok(VariantIndex {
            ty,
            by_name: variants
                .iter()
                .map(|v| (v.name.clone(), v.index))
                .collect(),
            by_index: variants
                .iter()
                .map(|v| (v.index, v.name.clone()))
                .collect(),
        })
    }
    /// The variant type itself.
    pub fn ty(&self) -> TypeId {
        self.ty
    }
    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }
    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.by_index.get(&index).map(|s| s.as_str())
    }
    pub fn len(&self) -> usize {
        self.by_index.len()
    }
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }
}

/// Metadata for a specific pallet.
#[derive(Debug, Clone)]
pub struct PalletMetadata {
    name: String,
    index: u8,
    calls: Option<VariantIndex>,
    events: Option<VariantIndex>,
    errors: Option<VariantIndex>,
    storage_prefix: Option<String>,
    storage: HashMap<String, StorageEntryMetadata>,
    constants: HashMap<String, ConstantMetadata>,
    docs: Vec<String>,
}

impl PalletMetadata {
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The on-chain index, used as first byte of encoded calls and events.
    pub fn index(&self) -> u8 {
        self.index
    }
    pub fn calls(&self) -> Option<&VariantIndex> {
        self.calls.as_ref()
    }
    pub fn events(&self) -> Option<&VariantIndex> {
        self.events.as_ref()
    }
    pub fn errors(&self) -> Option<&VariantIndex> {
        self.errors.as_ref()
    }
    /// The storage prefix, which usually equals the pallet name.
    pub fn storage_prefix(&self) -> &str {
        self.storage_prefix.as_deref().unwrap_or(&self.name)
    }
    pub fn storage(&self, name: &str) -> Option<&StorageEntryMetadata> {
        self.storage.get(name)
    }
    pub fn storage_entries(&self) -> impl Iterator<Item = &StorageEntryMetadata> {
        self.storage.values()
    }
    pub fn constant(&self, name: &str) -> Option<&ConstantMetadata> {
        self.constants.get(name)
    }
    pub fn constants(&self) -> impl Iterator<Item = &ConstantMetadata> {
        self.constants.values()
    }
    pub fn docs(&self) -> &[String] {
        &self.docs
    }
}

/// A storage item of a pallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntryMetadata {
    pub pallet: String,
    pub name: String,
    pub modifier: StorageEntryModifier,
    /// One hasher per key. Empty for plain storage values.
    pub hashers: Vec<StorageHasher>,
    /// The type of each key, in the same order as `hashers`.
    pub key_types: Vec<TypeId>,
    pub value_ty: TypeId,
    /// Encoded value returned when the entry is absent and the modifier is
    /// [`StorageEntryModifier::Default`].
    pub default: Vec<u8>,
    pub docs: Vec<String>,
}

impl StorageEntryMetadata {
    /// Number of keys required to address a single value.
    pub fn arity(&self) -> usize {
        self.hashers.len()
    }
    pub fn is_map(&self) -> bool {
        !self.hashers.is_empty()
    }
}

/// A constant of a pallet together with its encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantMetadata {
    pub name: String,
    pub ty: TypeId,
    pub value: Vec<u8>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedExtensionMetadata {
    pub identifier: String,
    /// Type of the data included in the extrinsic.
    pub ty: TypeId,
    /// Type of the data only included in the signed payload.
    pub additional_signed: TypeId,
}

/// Shape of the extrinsic envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtrinsicMetadata {
    pub version: u8,
    pub address_ty: Option<TypeId>,
    pub call_ty: Option<TypeId>,
    pub signature_ty: Option<TypeId>,
    pub extra_ty: Option<TypeId>,
    pub signed_extensions: Vec<SignedExtensionMetadata>,
}

/// Types of the runtime wide enums aggregating all pallets (V15+).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterEnums {
    pub call_enum_ty: TypeId,
    pub event_enum_ty: TypeId,
    pub error_enum_ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeApiMetadata {
    pub name: String,
    methods: HashMap<String, RuntimeApiMethod>,
    pub docs: Vec<String>,
}

impl RuntimeApiMetadata {
    pub fn method(&self, name: &str) -> Option<&RuntimeApiMethod> {
        self.methods.get(name)
    }
    pub fn methods(&self) -> impl Iterator<Item = &RuntimeApiMethod> {
        self.methods.values()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeApiMethod {
    pub api: String,
    pub name: String,
    /// Parameter names and types, in call order.
    pub inputs: Vec<(String, TypeId)>,
    pub output: TypeId,
    pub docs: Vec<String>,
}

impl RuntimeApiMethod {
    /// Name of the `state_call` entry point, e.g. `Core_version`.
    pub fn state_call_name(&self) -> String {
        format!("{}_{}", self.api, self.name)
    }
}

/// An entry of the V15 custom metadata side table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomValue {
    pub ty: TypeId,
    pub value: Vec<u8>,
}

/// A pallet call, event or error arm together with its pallet.
#[derive(Debug, Clone, Copy)]
pub struct VariantInfo<'a> {
    pub pallet: &'a PalletMetadata,
    pub variant: &'a Variant,
}

// Shared shape of V14 and V15 pallets.
struct PalletParts {
    name: String,
    index: u8,
    storage: Option<v14::PalletStorageMetadata>,
    calls: Option<TypeRef>,
    event: Option<TypeRef>,
    error: Option<TypeRef>,
    constants: Vec<v14::PalletConstantMetadata>,
    docs: Vec<String>,
}

impl From<v14::PalletMetadata> for PalletParts {
    fn from(val: v14::PalletMetadata) -> Self {
        PalletParts {
            name: val.name,
            index: val.index,
            storage: val.storage,
            calls: val.calls.map(|c| c.ty),
            event: val.event.map(|e| e.ty),
            error: val.error.map(|e| e.ty),
            constants: val.constants,
            docs: vec![],
        }
    }
}

impl From<v15::PalletMetadata> for PalletParts {
    fn from(val: v15::PalletMetadata) -> Self {
        PalletParts {
            name: val.name,
            index: val.index,
            storage: val.storage,
            calls: val.calls.map(|c| c.ty),
            event: val.event.map(|e| e.ty),
            error: val.error.map(|e| e.ty),
            constants: val.constants,
            docs: val.docs,
        }
    }
}

fn lookup(wire: &WireRegistry, ty: &TypeRef, owner: &str) -> Result<TypeId> {
    wire.lookup(ty.0).ok_or_else(|| Error::TypeNotFound {
        id: ty.0,
        owner: owner.to_string(),
    })
}

impl Metadata {
    /// Parses a raw metadata blob, with or without the `meta` magic number.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        RuntimeMetadata::decode_prefixed(raw)?.try_into()
    }
    fn from_v14(meta: v14::RuntimeMetadataV14) -> Result<Self> {
        let wire = WireRegistry::from_portable(&meta.types)?;
        let extrinsic_ty = lookup(&wire, &meta.extrinsic.ty, "extrinsic")?;

        // V14 does not describe the envelope directly, but the
        // `UncheckedExtrinsic` carries its parts as generic parameters.
        let param = |name: &str| {
            wire.registry
                .entry(extrinsic_ty)
                .and_then(|entry| entry.param(name))
        };
        let extrinsic = ExtrinsicMetadata {
            version: meta.extrinsic.version,
            address_ty: param("Address"),
            call_ty: param("Call"),
            signature_ty: param("Signature"),
            extra_ty: param("Extra"),
            signed_extensions: Self::signed_extensions(&wire, &meta.extrinsic.signed_extensions)?,
        };
        let runtime_ty = lookup(&wire, &meta.ty, "runtime")?;

        Self::assemble(
            14,
            wire,
            meta.pallets.into_iter().map(Into::into).collect(),
            extrinsic,
            runtime_ty,
            None,
            vec![],
            Default::default(),
        )
    }
    fn from_v15(meta: v15::RuntimeMetadataV15) -> Result<Self> {
        let wire = WireRegistry::from_portable(&meta.types)?;
        let extrinsic = ExtrinsicMetadata {
            version: meta.extrinsic.version,
            address_ty: Some(lookup(&wire, &meta.extrinsic.address_ty, "extrinsic")?),
            call_ty: Some(lookup(&wire, &meta.extrinsic.call_ty, "extrinsic")?),
            signature_ty: Some(lookup(&wire, &meta.extrinsic.signature_ty, "extrinsic")?),
            extra_ty: Some(lookup(&wire, &meta.extrinsic.extra_ty, "extrinsic")?),
            signed_extensions: Self::signed_extensions(&wire, &meta.extrinsic.signed_extensions)?,
        };
        let outer_enums = OuterEnums {
            call_enum_ty: lookup(&wire, &meta.outer_enums.call_enum_ty, "outer enums")?,
            event_enum_ty: lookup(&wire, &meta.outer_enums.event_enum_ty, "outer enums")?,
            error_enum_ty: lookup(&wire, &meta.outer_enums.error_enum_ty, "outer enums")?,
        };
        let runtime_ty = lookup(&wire, &meta.ty, "runtime")?;

        Self::assemble(
            15,
            wire,
            meta.pallets.into_iter().map(Into::into).collect(),
            extrinsic,
            runtime_ty,
            Some(outer_enums),
            meta.apis,
            meta.custom.map,
        )
    }
    fn signed_extensions(
        wire: &WireRegistry,
        exts: &[v14::SignedExtensionMetadata],
    ) -> Result<Vec<SignedExtensionMetadata>> {
        exts.iter()
            .map(|ext| {
                Ok(SignedExtensionMetadata {
                    identifier: ext.identifier.clone(),
                    ty: lookup(wire, &ext.ty, &ext.identifier)?,
                    additional_signed: lookup(wire, &ext.additional_signed, &ext.identifier)?,
                })
            })
            .collect()
    }
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        version: u8,
        wire: WireRegistry,
        pallet_parts: Vec<PalletParts>,
        extrinsic: ExtrinsicMetadata,
        runtime_ty: TypeId,
        outer_enums: Option<OuterEnums>,
        apis: Vec<v15::RuntimeApiMetadata>,
        custom: std::collections::BTreeMap<String, v15::CustomValueMetadata>,
    ) -> Result<Self> {
        let mut pallets = Vec::with_capacity(pallet_parts.len());
        let mut pallets_by_name = HashMap::new();
        let mut pallets_by_index = HashMap::new();

        for parts in pallet_parts {
            let pallet = Self::pallet(&wire, parts)?;

            if pallets_by_name
                .insert(pallet.name.clone(), pallets.len())
                .is_some()
            {
                return Err(Error::DuplicatePallet(pallet.name));
            }
            if pallets_by_index
                .insert(pallet.index, pallets.len())
                .is_some()
            {
                return Err(Error::DuplicatePallet(pallet.name));
            }

            pallets.push(pallet);
        }

        let apis = apis
            .into_iter()
            .map(|api| {
                let methods = api
                    .methods
                    .into_iter()
                    .map(|method| {
                        let owner = format!("{}_{}", api.name, method.name);
                        let inputs = method
                            .inputs
                            .iter()
                            .map(|input| Ok((input.name.clone(), lookup(&wire, &input.ty, &owner)?)))
                            .collect::<Result<Vec<_>>>()?;

                        Ok((
                            method.name.clone(),
                            RuntimeApiMethod {
                                api: api.name.clone(),
                                name: method.name,
                                inputs,
                                output: lookup(&wire, &method.output, &owner)?,
                                docs: method.docs,
                            },
                        ))
                    })
                    .collect::<Result<HashMap<_, _>>>()?;

                Ok((
                    api.name.clone(),
                    RuntimeApiMetadata {
                        name: api.name,
                        methods,
                        docs: api.docs,
                    },
                ))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        let custom = custom
            .into_iter()
            .map(|(name, value)| {
                let ty = lookup(&wire, &value.ty, &name)?;
                Ok((
                    name,
                    CustomValue {
                        ty,
                        value: value.value,
                    },
                ))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        log::debug!(
            "Built V{} metadata with {} types, {} pallets and {} runtime APIs",
            version,
            wire.registry.len(),
            pallets.len(),
            apis.len()
        );

        Ok(Metadata {
            version,
            types: wire.registry,
            pallets,
            pallets_by_name,
            pallets_by_index,
            extrinsic,
            runtime_ty,
            outer_enums,
            apis,
            custom,
        })
    }
    fn pallet(wire: &WireRegistry, parts: PalletParts) -> Result<PalletMetadata> {
        let types = &wire.registry;
        let name = parts.name;

        let variants = |ty: Option<TypeRef>| {
            ty.map(|ty| VariantIndex::new(types, lookup(wire, &ty, &name)?, &name))
                .transpose()
        };
        let calls = variants(parts.calls)?;
        let events = variants(parts.event)?;
        let errors = variants(parts.error)?;

        let mut storage = HashMap::new();
        let storage_prefix = parts.storage.as_ref().map(|s| s.prefix.clone());
        for entry in parts.storage.into_iter().flat_map(|s| s.entries) {
            let owner = format!("{}::{}", name, entry.name);
            let (hashers, key_types, value_ty) = match entry.ty {
                v14::StorageEntryType::Plain(value) => {
                    (vec![], vec![], lookup(wire, &value, &owner)?)
                }
                v14::StorageEntryType::Map {
                    hashers,
                    key,
                    value,
                } => {
                    let key = lookup(wire, &key, &owner)?;
                    // With several hashers the key is a tuple holding one
                    // element per hasher.
                    let key_types = match (hashers.len(), types.resolve(key)) {
                        (1, _) => vec![key],
                        (n, Some(TypeDefinition::Tuple(elems))) if n == elems.len() => {
                            elems.clone()
                        }
                        (n, _) => {
                            return Err(Error::StorageKeyArity {
                                entry: owner,
                                hashers: n,
                            })
                        }
                    };

                    (hashers, key_types, lookup(wire, &value, &owner)?)
                }
            };

            storage.insert(
                entry.name.clone(),
                StorageEntryMetadata {
                    pallet: name.clone(),
                    name: entry.name,
                    modifier: entry.modifier,
                    hashers,
                    key_types,
                    value_ty,
                    default: entry.default,
                    docs: entry.docs,
                },
            );
        }

        let constants = parts
            .constants
            .into_iter()
            .map(|c| {
                let ty = lookup(wire, &c.ty, &format!("{}::{}", name, c.name))?;
                Ok((
                    c.name.clone(),
                    ConstantMetadata {
                        name: c.name,
                        ty,
                        value: c.value,
                        docs: c.docs,
                    },
                ))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(PalletMetadata {
            name,
            index: parts.index,
            calls,
            events,
            errors,
            storage_prefix,
            storage,
            constants,
            docs: parts.docs,
        })
    }
}

impl TryFrom<RuntimeMetadata> for Metadata {
    type Error = Error;

    fn try_from(val: RuntimeMetadata) -> Result<Self> {
        match val {
            RuntimeMetadata::V14(m) => Metadata::from_v14(m),
            RuntimeMetadata::V15(m) => Metadata::from_v15(m),
        }
    }
}

impl Metadata {
    /// The wire format version this metadata was built from.
    pub fn version(&self) -> u8 {
        self.version
    }
    /// The type registry.
    pub fn types(&self) -> &Registry {
        &self.types
    }
    pub fn resolve_type(&self, id: TypeId) -> Option<&TypeDefinition> {
        self.types.resolve(id)
    }
    /// The type of the `Runtime`.
    pub fn runtime_ty(&self) -> TypeId {
        self.runtime_ty
    }
    pub fn pallets(&self) -> impl Iterator<Item = &PalletMetadata> {
        self.pallets.iter()
    }
    pub fn pallet_by_name(&self, name: &str) -> Option<&PalletMetadata> {
        self.pallets_by_name.get(name).map(|idx| &self.pallets[*idx])
    }
    pub fn pallet_by_index(&self, index: u8) -> Option<&PalletMetadata> {
        self.pallets_by_index.get(&index).map(|idx| &self.pallets[*idx])
    }
    /// Identical to `pallet_by_name`, but returns an error if the pallet is
    /// not present.
    pub fn pallet_by_name_err(&self, name: &str) -> Result<&PalletMetadata> {
        self.pallet_by_name(name)
            .ok_or_else(|| Error::PalletNotFound(name.to_string()))
    }
    pub fn storage(&self, pallet: &str, item: &str) -> Option<&StorageEntryMetadata> {
        self.pallet_by_name(pallet)?.storage(item)
    }
    pub fn constant(&self, pallet: &str, name: &str) -> Option<&ConstantMetadata> {
        self.pallet_by_name(pallet)?.constant(name)
    }
    pub fn extrinsic(&self) -> &ExtrinsicMetadata {
        &self.extrinsic
    }
    pub fn outer_enums(&self) -> Option<&OuterEnums> {
        self.outer_enums.as_ref()
    }
    pub fn runtime_api(&self, name: &str) -> Option<&RuntimeApiMetadata> {
        self.apis.get(name)
    }
    pub fn runtime_apis(&self) -> impl Iterator<Item = &RuntimeApiMetadata> {
        self.apis.values()
    }
    pub fn runtime_api_method(&self, api: &str, method: &str) -> Option<&RuntimeApiMethod> {
        self.runtime_api(api)?.method(method)
    }
    pub fn custom_value(&self, name: &str) -> Option<&CustomValue> {
        self.custom.get(name)
    }
    /// Finds the arm of a variant type by its declared index.
    pub fn variant_by_index(&self, ty: TypeId, index: u8) -> Option<&Variant> {
        match self.types.resolve(ty)? {
            TypeDefinition::Variant(variants) => variants.iter().find(|v| v.index == index),
            _ => None,
        }
    }
    /// Finds the arm of a variant type by its name.
    pub fn variant_by_name(&self, ty: TypeId, name: &str) -> Option<&Variant> {
        match self.types.resolve(ty)? {
            TypeDefinition::Variant(variants) => variants.iter().find(|v| v.name == name),
            _ => None,
        }
    }
    pub fn call(&self, pallet: &str, call: &str) -> Option<VariantInfo<'_>> {
        let pallet = self.pallet_by_name(pallet)?;
        let ty = pallet.calls()?.ty();
        Some(VariantInfo {
            pallet,
            variant: self.variant_by_name(ty, call)?,
        })
    }
    pub fn call_by_index(&self, pallet: u8, call: u8) -> Option<VariantInfo<'_>> {
        self.pallet_variant(pallet, call, PalletMetadata::calls)
    }
    pub fn event_by_index(&self, pallet: u8, event: u8) -> Option<VariantInfo<'_>> {
        self.pallet_variant(pallet, event, PalletMetadata::events)
    }
    pub fn error_by_index(&self, pallet: u8, error: u8) -> Option<VariantInfo<'_>> {
        self.pallet_variant(pallet, error, PalletMetadata::errors)
    }
    fn pallet_variant(
        &self,
        pallet: u8,
        index: u8,
        select: fn(&PalletMetadata) -> Option<&VariantIndex>,
    ) -> Option<VariantInfo<'_>> {
        let pallet = self.pallet_by_index(pallet)?;
        let ty = select(pallet)?.ty();
        Some(VariantInfo {
            pallet,
            variant: self.variant_by_index(ty, index)?,
        })
    }
}
