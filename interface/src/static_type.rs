//! Rust types describing their own shape.
//!
//! A type implementing [`IdentifiableType`] can produce the
//! [`TypeDefinition`] of its SCALE layout without any access to a chain. The
//! definitions of a static type graph are collected in a [`StaticRegistry`],
//! which uses the same two-pass construction as the registry built from
//! metadata, so recursive types are fine.
//!
//! [`validate`] then checks the static shape against the type the chain
//! declares. Field and type names are ignored, only the layout and the variant
//! indices have to agree.
//!
//! ```
//! use tessera::static_type::{validate, IdentifiableType, StaticRegistry};
//!
//! #[derive(IdentifiableType)]
//! struct Transfer {
//!     dest: [u8; 32],
//!     #[codec(compact)]
//!     value: u128,
//! }
//!
//! let mut statics = StaticRegistry::new();
//! let ty = statics.register::<Transfer>();
//! let types = statics.build().unwrap();
//!
//! // Validating a registry against itself always succeeds.
//! validate(&types, ty, &types, ty).unwrap();
//! ```

use crate::codec::{CodecPath, PathSegment};
use crate::metadata::{
    Field, Primitive, Registry, RegistryBuilder, RegistryError, TypeDefinition, TypeEntry, TypeId,
    Variant,
};
use crate::num::{I512, U256, U512};
use parity_scale_codec::Compact;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;

pub use tessera_generator::IdentifiableType;

/// A type that can describe its own SCALE layout.
pub trait IdentifiableType: 'static {
    /// Module path and name. Informational only.
    fn path() -> Vec<String> {
        vec![]
    }
    /// The definition of the type, registering every constituent type with
    /// `registry`.
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition;
}

/// Registry of the definitions of a static type graph.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    builder: RegistryBuilder,
    ids: HashMap<std::any::TypeId, TypeId>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Default::default()
    }
    /// Returns the identifier of `T`, registering it first if required.
    ///
    /// The identifier is reserved before the definition of `T` is requested,
    /// so a type referring to itself receives its own identifier.
    pub fn register<T: IdentifiableType>(&mut self) -> TypeId {
        let key = std::any::TypeId::of::<T>();
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }

        let id = self.builder.reserve();
        self.ids.insert(key, id);

        let entry = TypeEntry::new(T::definition(self)).with_path(T::path());
        let defined = self.builder.define(id, entry);
        debug_assert!(defined.is_ok(), "identifier was reserved by this registry");

        id
    }
    pub fn build(self) -> Result<Registry, RegistryError> {
        self.builder.build()
    }
}

/// Registers `T` in a fresh registry, returning the registry and the type.
pub fn registry_of<T: IdentifiableType>() -> Result<(Registry, TypeId), RegistryError> {
    let mut statics = StaticRegistry::new();
    let ty = statics.register::<T>();
    Ok((statics.build()?, ty))
}

/// The first point at which a static type diverges from the chain's type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("static type {found} does not match {expected} at {path}")]
pub struct TypeMismatch {
    pub path: CodecPath,
    /// Shape declared by the chain.
    pub expected: String,
    /// Shape declared by the static type.
    pub found: String,
}

/// Checks that static type `ours` has the same layout as the chain's type
/// `theirs`.
pub fn validate(
    static_types: &Registry,
    ours: TypeId,
    chain_types: &Registry,
    theirs: TypeId,
) -> Result<(), TypeMismatch> {
    Validator::new(static_types, chain_types).check(ours, theirs)
}

/// Checks that the fields of static type `ours` match a list of fields of the
/// chain, e.g. the fields of a call or an event.
pub fn validate_fields(
    static_types: &Registry,
    ours: TypeId,
    chain_types: &Registry,
    theirs: &[Field],
) -> Result<(), TypeMismatch> {
    let mut validator = Validator::new(static_types, chain_types);

    let our_fields = match static_types.resolve(ours) {
        Some(TypeDefinition::Composite(fields)) => fields.iter().map(|f| f.ty).collect(),
        Some(TypeDefinition::Tuple(elems)) => elems.clone(),
        Some(TypeDefinition::Void) => vec![],
        _ => {
            return Err(validator.mismatch(
                format!("{} fields", theirs.len()),
                describe(static_types, ours),
            ))
        }
    };

    validator.check_fields(&our_fields, theirs.iter().map(|f| (f.name.as_deref(), f.ty)).collect())
}

/// Validates `T` against the chain's type `ty`.
pub fn validate_type<T: IdentifiableType>(chain_types: &Registry, ty: TypeId) -> crate::Result<()> {
    let (statics, ours) = registry_of::<T>().map_err(crate::metadata::Error::from)?;
    validate(&statics, ours, chain_types, ty)?;
    Ok(())
}

fn describe(types: &Registry, id: TypeId) -> String {
    let name = types.display_name(id);

    match types.resolve(id) {
        Some(TypeDefinition::Composite(fields)) => format!("{} with {} fields", name, fields.len()),
        Some(TypeDefinition::Tuple(elems)) => format!("{} with {} elements", name, elems.len()),
        Some(TypeDefinition::Variant(variants)) => {
            format!("{} with {} variants", name, variants.len())
        }
        Some(TypeDefinition::Array { len, .. }) => format!("array of {}", len),
        _ => name,
    }
}

struct Validator<'a> {
    ours: &'a Registry,
    theirs: &'a Registry,
    // Pairs assumed to match, which ends the recursion on cyclic types.
    visited: HashSet<(TypeId, TypeId)>,
    path: Vec<PathSegment>,
}

impl<'a> Validator<'a> {
    fn new(ours: &'a Registry, theirs: &'a Registry) -> Self {
        Validator {
            ours,
            theirs,
            visited: HashSet::new(),
            path: vec![],
        }
    }
    fn mismatch(&self, expected: String, found: String) -> TypeMismatch {
        TypeMismatch {
            path: self.path.clone().into(),
            expected,
            found,
        }
    }
    fn shape_mismatch(&self, ours: TypeId, theirs: TypeId) -> TypeMismatch {
        self.mismatch(describe(self.theirs, theirs), describe(self.ours, ours))
    }
    fn check(&mut self, ours: TypeId, theirs: TypeId) -> Result<(), TypeMismatch> {
        let (ours, our_def) = normalize(self.ours, ours)
            .ok_or_else(|| self.mismatch(describe(self.theirs, theirs), format!("missing type {}", ours)))?;
        let (theirs, their_def) = normalize(self.theirs, theirs)
            .ok_or_else(|| self.mismatch(format!("missing type {}", theirs), describe(self.ours, ours)))?;

        if !self.visited.insert((ours, theirs)) {
            return Ok(());
        }

        match (our_def, their_def) {
            (TypeDefinition::Primitive(a), TypeDefinition::Primitive(b)) if a == b => Ok(()),
            (TypeDefinition::Void, TypeDefinition::Void) => Ok(()),
            (
                TypeDefinition::Composite(_) | TypeDefinition::Tuple(_),
                TypeDefinition::Composite(_) | TypeDefinition::Tuple(_),
            ) => {
                let our_fields = product(our_def).into_iter().map(|(_, ty)| ty).collect::<Vec<_>>();
                self.check_fields(&our_fields, product(their_def))
            }
            (TypeDefinition::Variant(a), TypeDefinition::Variant(b)) => self.check_variants(a, b, ours, theirs),
            (TypeDefinition::Sequence(a), TypeDefinition::Sequence(b)) => self.check(*a, *b),
            (
                TypeDefinition::Array { element: a, len: la },
                TypeDefinition::Array { element: b, len: lb },
            ) if la == lb => self.check(*a, *b),
            (TypeDefinition::Compact(a), TypeDefinition::Compact(b)) => self.check(*a, *b),
            (
                TypeDefinition::BitSequence { store: sa, order: oa },
                TypeDefinition::BitSequence { store: sb, order: ob },
            ) if oa == ob => self.check(*sa, *sb),
            _ => Err(self.shape_mismatch(ours, theirs)),
        }
    }
    fn check_fields(&mut self, ours: &[TypeId], theirs: Vec<(Option<&str>, TypeId)>) -> Result<(), TypeMismatch> {
        if ours.len() != theirs.len() {
            return Err(self.mismatch(
                format!("{} fields", theirs.len()),
                format!("{} fields", ours.len()),
            ));
        }

        for (idx, (our_ty, (name, their_ty))) in ours.iter().zip(theirs).enumerate() {
            self.path.push(match name {
                Some(name) => PathSegment::Field(name.to_string()),
                None => PathSegment::Index(idx),
            });
            self.check(*our_ty, their_ty)?;
            self.path.pop();
        }

        Ok(())
    }
    fn check_variants(
        &mut self,
        ours: &[Variant],
        theirs: &[Variant],
        our_ty: TypeId,
        their_ty: TypeId,
    ) -> Result<(), TypeMismatch> {
        if ours.len() != theirs.len() {
            return Err(self.shape_mismatch(our_ty, their_ty));
        }

        for their_var in theirs {
            let our_var = ours
                .iter()
                .find(|v| v.index == their_var.index)
                .ok_or_else(|| {
                    self.mismatch(
                        format!("variant {} at index {}", their_var.name, their_var.index),
                        format!("no variant at index {}", their_var.index),
                    )
                })?;

            self.path.push(PathSegment::Variant(their_var.name.clone()));
            let our_fields: Vec<TypeId> = our_var.fields.iter().map(|f| f.ty).collect();
            self.check_fields(
                &our_fields,
                their_var.fields.iter().map(|f| (f.name.as_deref(), f.ty)).collect(),
            )?;
            self.path.pop();
        }

        Ok(())
    }
}

fn product(def: &TypeDefinition) -> Vec<(Option<&str>, TypeId)> {
    match def {
        TypeDefinition::Composite(fields) => fields.iter().map(|f| (f.name.as_deref(), f.ty)).collect(),
        TypeDefinition::Tuple(elems) => elems.iter().map(|ty| (None, *ty)).collect(),
        _ => vec![],
    }
}

const VOID: &TypeDefinition = &TypeDefinition::Void;

/// Looks through single field wrappers, which have the layout of their field,
/// and treats empty products as `Void`.
fn normalize(types: &Registry, mut id: TypeId) -> Option<(TypeId, &TypeDefinition)> {
    // Bounded, a wrapper chain cannot be longer than the registry.
    for _ in 0..=types.len() {
        let def = types.resolve(id)?;
        match def {
            TypeDefinition::Composite(fields) if fields.len() == 1 => id = fields[0].ty,
            TypeDefinition::Tuple(elems) if elems.len() == 1 => id = elems[0],
            TypeDefinition::Composite(fields) if fields.is_empty() => return Some((id, VOID)),
            TypeDefinition::Tuple(elems) if elems.is_empty() => return Some((id, VOID)),
            _ => return Some((id, def)),
        }
    }

    None
}

macro_rules! impl_primitive {
    ($($ty:ty => $prim:ident),*) => {
        $(
            impl IdentifiableType for $ty {
                fn definition(_: &mut StaticRegistry) -> TypeDefinition {
                    TypeDefinition::Primitive(Primitive::$prim)
                }
            }
        )*
    };
}

impl_primitive!(
    bool => Bool,
    char => Char,
    String => Str,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    U256 => U256,
    U512 => U512,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    I512 => I512
);

impl<T: IdentifiableType> IdentifiableType for Vec<T> {
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Sequence(registry.register::<T>())
    }
}

impl<T: IdentifiableType, const N: usize> IdentifiableType for [T; N] {
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Array {
            element: registry.register::<T>(),
            len: N as u32,
        }
    }
}

impl<T: IdentifiableType> IdentifiableType for Option<T> {
    fn path() -> Vec<String> {
        vec!["Option".to_string()]
    }
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Variant(vec![
            Variant::new(0, "None", vec![]),
            Variant::new(1, "Some", vec![Field::unnamed(registry.register::<T>())]),
        ])
    }
}

impl<T: IdentifiableType, E: IdentifiableType> IdentifiableType for Result<T, E> {
    fn path() -> Vec<String> {
        vec!["Result".to_string()]
    }
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Variant(vec![
            Variant::new(0, "Ok", vec![Field::unnamed(registry.register::<T>())]),
            Variant::new(1, "Err", vec![Field::unnamed(registry.register::<E>())]),
        ])
    }
}

impl<T: IdentifiableType> IdentifiableType for Box<T> {
    fn path() -> Vec<String> {
        T::path()
    }
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        T::definition(registry)
    }
}

impl<T: IdentifiableType> IdentifiableType for Compact<T> {
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Compact(registry.register::<T>())
    }
}

impl<K: IdentifiableType, V: IdentifiableType> IdentifiableType for BTreeMap<K, V> {
    fn path() -> Vec<String> {
        vec!["BTreeMap".to_string()]
    }
    fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Sequence(registry.register::<(K, V)>())
    }
}

impl<T: 'static> IdentifiableType for PhantomData<T> {
    fn definition(_: &mut StaticRegistry) -> TypeDefinition {
        TypeDefinition::Tuple(vec![])
    }
}

macro_rules! impl_tuple {
    ($($name:ident),*) => {
        impl<$($name: IdentifiableType),*> IdentifiableType for ($($name,)*) {
            #[allow(unused_variables)]
            fn definition(registry: &mut StaticRegistry) -> TypeDefinition {
                TypeDefinition::Tuple(vec![$(registry.register::<$name>()),*])
            }
        }
    };
}

impl_tuple!();
impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
impl_tuple!(A, B, C, D, E, F, G);
impl_tuple!(A, B, C, D, E, F, G, H);
impl_tuple!(A, B, C, D, E, F, G, H, I);
impl_tuple!(A, B, C, D, E, F, G, H, I, J);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::BitOrder;

    #[derive(IdentifiableType)]
    struct Pair {
        a: u32,
        b: bool,
    }

    #[derive(IdentifiableType)]
    struct Swapped {
        a: bool,
        b: u32,
    }

    #[derive(IdentifiableType)]
    struct Tree {
        value: u8,
        children: Option<Vec<Tree>>,
    }

    #[derive(IdentifiableType)]
    #[allow(dead_code)]
    #[repr(u8)]
    enum Event {
        #[codec(index = 2)]
        Deposited { who: [u8; 32], amount: u128 },
        Killed = 7,
    }

    fn chain_registry(build: impl FnOnce(&mut RegistryBuilder) -> TypeId) -> (Registry, TypeId) {
        let mut b = Registry::builder();
        let ty = build(&mut b);
        (b.build().unwrap(), ty)
    }

    fn primitive(b: &mut RegistryBuilder, p: Primitive) -> TypeId {
        b.insert(TypeEntry::new(TypeDefinition::Primitive(p)))
    }

    #[test]
    fn field_names_are_ignored() {
        let (chain, ty) = chain_registry(|b| {
            let u32_ty = primitive(b, Primitive::U32);
            let bool_ty = primitive(b, Primitive::Bool);
            b.insert(TypeEntry::new(TypeDefinition::Composite(vec![
                Field::named("x", u32_ty),
                Field::named("y", bool_ty),
            ])))
        });

        validate_type::<Pair>(&chain, ty).unwrap();
        assert!(validate_type::<Swapped>(&chain, ty).is_err());
    }

    #[test]
    fn mismatch_names_the_diverging_field() {
        let (chain, ty) = chain_registry(|b| {
            let u32_ty = primitive(b, Primitive::U32);
            let bool_ty = primitive(b, Primitive::Bool);
            b.insert(TypeEntry::new(TypeDefinition::Composite(vec![
                Field::named("x", u32_ty),
                Field::named("y", bool_ty),
            ])))
        });

        let (statics, ours) = registry_of::<Swapped>().unwrap();
        let err = validate(&statics, ours, &chain, ty).unwrap_err();
        assert_eq!(err.path.to_string(), ".x");
        assert_eq!(err.expected, "u32");
        assert_eq!(err.found, "bool");
    }

    #[test]
    fn recursive_types_register_once() {
        let (statics, ty) = registry_of::<Tree>().unwrap();

        let children = match statics.resolve(ty) {
            Some(TypeDefinition::Composite(fields)) => fields[1].ty,
            other => panic!("unexpected {:?}", other),
        };
        let vec_ty = match statics.resolve(children) {
            Some(TypeDefinition::Variant(variants)) => variants[1].fields[0].ty,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(statics.resolve(vec_ty), Some(&TypeDefinition::Sequence(ty)));

        // A recursive type validates against itself without looping.
        validate(&statics, ty, &statics, ty).unwrap();
    }

    #[test]
    fn variant_indices_must_agree() {
        let (statics, ours) = registry_of::<Event>().unwrap();
        let indices: Vec<u8> = match statics.resolve(ours) {
            Some(TypeDefinition::Variant(variants)) => variants.iter().map(|v| v.index).collect(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(indices, vec![2, 7]);

        let chain_event = |killed: u8| {
            chain_registry(|b| {
                let u8_ty = primitive(b, Primitive::U8);
                let u128_ty = primitive(b, Primitive::U128);
                let account = b.insert(TypeEntry::new(TypeDefinition::Array {
                    element: u8_ty,
                    len: 32,
                }));
                let account_id = b.insert(
                    TypeEntry::new(TypeDefinition::Composite(vec![Field::unnamed(account)]))
                        .with_path(["sp_core", "crypto", "AccountId32"]),
                );
                b.insert(TypeEntry::new(TypeDefinition::Variant(vec![
                    Variant::new(
                        2,
                        "Deposit",
                        vec![Field::named("account", account_id), Field::named("value", u128_ty)],
                    ),
                    Variant::new(killed, "KilledAccount", vec![]),
                ])))
            })
        };

        // Renamed arms and a newtype around the account bytes still match.
        let (chain, ty) = chain_event(7);
        validate(&statics, ours, &chain, ty).unwrap();

        let (chain, ty) = chain_event(3);
        assert!(validate(&statics, ours, &chain, ty).is_err());
    }

    #[test]
    fn compact_and_bit_sequences() {
        let (chain, ty) = chain_registry(|b| {
            let u128_ty = primitive(b, Primitive::U128);
            b.insert(TypeEntry::new(TypeDefinition::Compact(u128_ty)))
        });
        validate_type::<Compact<u128>>(&chain, ty).unwrap();
        assert!(validate_type::<u128>(&chain, ty).is_err());
        assert!(validate_type::<Compact<u64>>(&chain, ty).is_err());

        let (chain, ty) = chain_registry(|b| {
            let u8_ty = primitive(b, Primitive::U8);
            b.insert(TypeEntry::new(TypeDefinition::BitSequence {
                store: u8_ty,
                order: BitOrder::Lsb0,
            }))
        });
        assert!(validate_type::<Vec<bool>>(&chain, ty).is_err());
    }

    #[test]
    fn unit_shapes_are_interchangeable() {
        let (chain, ty) = chain_registry(|b| b.insert(TypeEntry::new(TypeDefinition::Composite(vec![]))));

        validate_type::<()>(&chain, ty).unwrap();
        validate_type::<PhantomData<u32>>(&chain, ty).unwrap();
        assert!(validate_type::<u8>(&chain, ty).is_err());
    }

    #[test]
    fn call_fields_are_compared_as_a_product() {
        let (chain, _) = chain_registry(|b| primitive(b, Primitive::U32));
        let u32_ty = chain.iter().next().map(|(id, _)| id).unwrap();

        let fields = vec![Field::named("a", u32_ty), Field::named("b", u32_ty)];
        let (statics, ours) = registry_of::<(u32, u32)>().unwrap();
        validate_fields(&statics, ours, &chain, &fields).unwrap();

        let (statics, ours) = registry_of::<Pair>().unwrap();
        let err = validate_fields(&statics, ours, &chain, &fields).unwrap_err();
        assert_eq!(err.path.to_string(), ".b");
    }
}
