//! The type registry: an arena of [`TypeEntry`] nodes addressed by [`TypeId`].
//!
//! Type graphs may be self-referential (a call enum that contains a `Vec` of
//! itself, for example). The registry therefore never owns definitions
//! recursively. Instead it is populated in two passes through a
//! [`RegistryBuilder`]: first every type is given an identifier with
//! [`RegistryBuilder::reserve`], then every body is filled in with
//! [`RegistryBuilder::define`]. Since all identifiers exist before any body is
//! built, cycles are simply references into the arena.

use crate::version::portable::{self, PortableRegistry, TypeDefPrimitive};
use std::collections::HashMap;
use std::fmt;

/// Opaque handle into a [`Registry`]. Only meaningful for the registry that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// The position of the type inside of its registry.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Primitive type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Char,
    Str,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    U512,
    I8,
    I16,
    I32,
    I64,
    I128,
    I256,
    I512,
}

impl Primitive {
    /// Bit width of integer kinds, `None` for `bool`, `char` and `str`.
    pub fn bits(&self) -> Option<u32> {
        use Primitive::*;

        match self {
            U8 | I8 => Some(8),
            U16 | I16 => Some(16),
            U32 | I32 => Some(32),
            U64 | I64 => Some(64),
            U128 | I128 => Some(128),
            U256 | I256 => Some(256),
            U512 | I512 => Some(512),
            Bool | Char | Str => None,
        }
    }
    pub fn is_signed(&self) -> bool {
        use Primitive::*;
        matches!(self, I8 | I16 | I32 | I64 | I128 | I256 | I512)
    }
    pub fn is_unsigned(&self) -> bool {
        self.bits().is_some() && !self.is_signed()
    }
    pub fn name(&self) -> &'static str {
        use Primitive::*;

        match self {
            Bool => "bool",
            Char => "char",
            Str => "str",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            U128 => "u128",
            U256 => "u256",
            U512 => "u512",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            I128 => "i128",
            I256 => "i256",
            I512 => "i512",
        }
    }
}

impl From<TypeDefPrimitive> for Primitive {
    fn from(val: TypeDefPrimitive) -> Self {
        match val {
            TypeDefPrimitive::Bool => Primitive::Bool,
            TypeDefPrimitive::Char => Primitive::Char,
            TypeDefPrimitive::Str => Primitive::Str,
            TypeDefPrimitive::U8 => Primitive::U8,
            TypeDefPrimitive::U16 => Primitive::U16,
            TypeDefPrimitive::U32 => Primitive::U32,
            TypeDefPrimitive::U64 => Primitive::U64,
            TypeDefPrimitive::U128 => Primitive::U128,
            TypeDefPrimitive::U256 => Primitive::U256,
            TypeDefPrimitive::I8 => Primitive::I8,
            TypeDefPrimitive::I16 => Primitive::I16,
            TypeDefPrimitive::I32 => Primitive::I32,
            TypeDefPrimitive::I64 => Primitive::I64,
            TypeDefPrimitive::I128 => Primitive::I128,
            TypeDefPrimitive::I256 => Primitive::I256,
        }
    }
}

/// A field of a composite type or of an enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// `None` for tuple-like structs and variants.
    pub name: Option<String>,
    pub ty: TypeId,
    /// The Rust type name as written in the runtime source, informational.
    pub type_name: Option<String>,
}

impl Field {
    pub fn named<N: Into<String>>(name: N, ty: TypeId) -> Self {
        Field {
            name: Some(name.into()),
            ty,
            type_name: None,
        }
    }
    pub fn unnamed(ty: TypeId) -> Self {
        Field {
            name: None,
            ty,
            type_name: None,
        }
    }
}

/// An arm of a [`TypeDefinition::Variant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// The declared discriminant. Not necessarily the position of the arm.
    pub index: u8,
    pub name: String,
    pub fields: Vec<Field>,
    pub docs: Vec<String>,
}

impl Variant {
    pub fn new<N: Into<String>>(index: u8, name: N, fields: Vec<Field>) -> Self {
        Variant {
            index,
            name: name.into(),
            fields,
            docs: vec![],
        }
    }
    /// Whether the arm carries named fields.
    pub fn is_named(&self) -> bool {
        self.fields.first().map(|f| f.name.is_some()).unwrap_or(false)
    }
}

/// Bit ordering of a bit sequence inside of its store elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOrder {
    Lsb0,
    Msb0,
}

/// A node in the type graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDefinition {
    Primitive(Primitive),
    Composite(Vec<Field>),
    Variant(Vec<Variant>),
    Sequence(TypeId),
    Array { element: TypeId, len: u32 },
    Tuple(Vec<TypeId>),
    Compact(TypeId),
    BitSequence { store: TypeId, order: BitOrder },
    Void,
}

impl TypeDefinition {
    /// Every type referenced directly by this definition.
    pub fn references(&self) -> Vec<TypeId> {
        match self {
            TypeDefinition::Primitive(_) | TypeDefinition::Void => vec![],
            TypeDefinition::Composite(fields) => fields.iter().map(|f| f.ty).collect(),
            TypeDefinition::Variant(variants) => variants
                .iter()
                .flat_map(|v| v.fields.iter().map(|f| f.ty))
                .collect(),
            TypeDefinition::Sequence(ty)
            | TypeDefinition::Array { element: ty, .. }
            | TypeDefinition::Compact(ty) => vec![*ty],
            TypeDefinition::Tuple(elems) => elems.clone(),
            TypeDefinition::BitSequence { store, .. } => vec![*store],
        }
    }
    /// Types whose encoding is embedded in this one without a length or
    /// discriminant in between.
    fn inline_references(&self) -> Vec<TypeId> {
        match self {
            TypeDefinition::Composite(fields) => fields.iter().map(|f| f.ty).collect(),
            TypeDefinition::Tuple(elems) => elems.clone(),
            TypeDefinition::Array { element, len } if *len > 0 => vec![*element],
            _ => vec![],
        }
    }
    /// Short description of the shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDefinition::Primitive(p) => p.name(),
            TypeDefinition::Composite(_) => "composite",
            TypeDefinition::Variant(_) => "variant",
            TypeDefinition::Sequence(_) => "sequence",
            TypeDefinition::Array { .. } => "array",
            TypeDefinition::Tuple(_) => "tuple",
            TypeDefinition::Compact(_) => "compact",
            TypeDefinition::BitSequence { .. } => "bit sequence",
            TypeDefinition::Void => "void",
        }
    }
}

/// A generic parameter of a type, as declared in the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub ty: Option<TypeId>,
}

/// A registered type: its definition plus descriptive information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// Module path and name, e.g. `["sp_core", "crypto", "AccountId32"]`.
    pub path: Vec<String>,
    pub params: Vec<TypeParam>,
    pub def: TypeDefinition,
    pub docs: Vec<String>,
}

impl TypeEntry {
    pub fn new(def: TypeDefinition) -> Self {
        TypeEntry {
            path: vec![],
            params: vec![],
            def,
            docs: vec![],
        }
    }
    pub fn with_path<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeEntry {
            path: path.into_iter().map(Into::into).collect(),
            ..self
        }
    }
    /// The last path segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.path.last().map(|s| s.as_str())
    }
    /// Generic parameter of the given name.
    pub fn param(&self, name: &str) -> Option<TypeId> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.ty)
    }
}

/// Errors that can occur when constructing a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("type {id} referenced by type {referenced_by} was never declared")]
    TypeNotFound { id: u32, referenced_by: u32 },
    #[error("type {0} is declared more than once")]
    DuplicateType(u32),
    #[error("type {0} was reserved but never defined")]
    Undefined(TypeId),
    #[error("type {0} was not reserved by this builder")]
    NotReserved(TypeId),
    #[error("bit order type {0} is neither `Lsb0` nor `Msb0`")]
    InvalidBitOrder(u32),
    #[error("type {0} contains itself without a variant or sequence in between")]
    InfiniteType(TypeId),
}

/// Arena of type definitions. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    types: Vec<TypeEntry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }
    pub fn resolve(&self, id: TypeId) -> Option<&TypeDefinition> {
        self.entry(id).map(|entry| &entry.def)
    }
    pub fn entry(&self, id: TypeId) -> Option<&TypeEntry> {
        self.types.get(id.0 as usize)
    }
    pub fn len(&self) -> usize {
        self.types.len()
    }
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeEntry)> {
        self.types
            .iter()
            .enumerate()
            .map(|(idx, entry)| (TypeId(idx as u32), entry))
    }
    /// Finds the first type whose path joined by `::` equals `path`.
    pub fn find_by_path(&self, path: &str) -> Option<TypeId> {
        self.iter()
            .find(|(_, entry)| !entry.path.is_empty() && entry.path.join("::") == path)
            .map(|(id, _)| id)
    }
    /// Human readable name of the type, falling back to the shape kind.
    pub fn display_name(&self, id: TypeId) -> String {
        match self.entry(id) {
            Some(entry) if !entry.path.is_empty() => entry.path.join("::"),
            Some(entry) => entry.def.kind().to_string(),
            None => format!("<unknown {}>", id),
        }
    }
}

/// Two-pass constructor for a [`Registry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    slots: Vec<Option<TypeEntry>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Default::default()
    }
    /// Allocates a new identifier with an empty body.
    pub fn reserve(&mut self) -> TypeId {
        self.slots.push(None);
        TypeId((self.slots.len() - 1) as u32)
    }
    /// Fills the body of a previously reserved identifier.
    pub fn define(&mut self, id: TypeId, entry: TypeEntry) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(RegistryError::NotReserved(id))?;

        *slot = Some(entry);
        Ok(())
    }
    /// Convenience for `reserve` followed by `define`, for types that cannot
    /// reference themselves.
    pub fn insert(&mut self, entry: TypeEntry) -> TypeId {
        self.slots.push(Some(entry));
        TypeId((self.slots.len() - 1) as u32)
    }
    pub fn is_defined(&self, id: TypeId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Some(_)))
    }
    pub fn get(&self, id: TypeId) -> Option<&TypeEntry> {
        self.slots.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }
    /// Verifies that every slot is defined, that no definition references
    /// an identifier outside of the arena and that no type contains itself
    /// directly.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let len = self.slots.len() as u32;
        let mut types = Vec::with_capacity(self.slots.len());

        for (idx, slot) in self.slots.into_iter().enumerate() {
            let entry = slot.ok_or(RegistryError::Undefined(TypeId(idx as u32)))?;
            if let Some(missing) = entry.def.references().into_iter().find(|r| r.0 >= len) {
                return Err(RegistryError::TypeNotFound {
                    id: missing.0,
                    referenced_by: idx as u32,
                });
            }

            types.push(entry);
        }

        if let Some(id) = find_inline_cycle(&types) {
            return Err(RegistryError::InfiniteType(id));
        }

        Ok(Registry { types })
    }
}

/// Depth first search over the inline references. Any cycle found would be a
/// value of infinite size.
fn find_inline_cycle(types: &[TypeEntry]) -> Option<TypeId> {
    const UNVISITED: u8 = 0;
    const ON_STACK: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNVISITED; types.len()];
    for root in 0..types.len() {
        if state[root] != UNVISITED {
            continue;
        }

        state[root] = ON_STACK;
        let mut stack = vec![(root, types[root].def.inline_references())];
        loop {
            let next = match stack.last_mut() {
                Some((_, children)) => children.pop(),
                None => break,
            };

            match next {
                Some(child) => {
                    let idx = child.0 as usize;
                    match state[idx] {
                        ON_STACK => return Some(child),
                        UNVISITED => {
                            state[idx] = ON_STACK;
                            stack.push((idx, types[idx].def.inline_references()));
                        }
                        _ => {}
                    }
                }
                None => {
                    if let Some((node, _)) = stack.pop() {
                        state[node] = DONE;
                    }
                }
            }
        }
    }

    None
}

/// A registry built from the wire format, together with the mapping from the
/// wire identifiers to the arena identifiers.
#[derive(Debug, Clone)]
pub struct WireRegistry {
    pub registry: Registry,
    ids: HashMap<u32, TypeId>,
}

impl WireRegistry {
    /// Ingests the portable registry of a metadata blob.
    pub fn from_portable(portable: &PortableRegistry) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        let mut ids = HashMap::with_capacity(portable.types.len());
        let mut by_wire = HashMap::with_capacity(portable.types.len());

        // Pass 1: every declared type gets its identifier.
        for ty in &portable.types {
            if ids.insert(ty.id, builder.reserve()).is_some() {
                return Err(RegistryError::DuplicateType(ty.id));
            }
            by_wire.insert(ty.id, &ty.ty);
        }

        // Pass 2: bodies, now that every reference can be looked up.
        for ty in &portable.types {
            let lookup = |wire: &portable::TypeRef| {
                ids.get(&wire.0)
                    .copied()
                    .ok_or(RegistryError::TypeNotFound {
                        id: wire.0,
                        referenced_by: ty.id,
                    })
            };
            let fields = |fields: &[portable::Field]| {
                fields
                    .iter()
                    .map(|f| {
                        Ok(Field {
                            name: f.name.clone(),
                            ty: lookup(&f.ty)?,
                            type_name: f.type_name.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, RegistryError>>()
            };

            let def = match &ty.ty.type_def {
                portable::TypeDef::Composite { fields: f } => TypeDefinition::Composite(fields(f)?),
                portable::TypeDef::Variant { variants } => TypeDefinition::Variant(
                    variants
                        .iter()
                        .map(|v| {
                            Ok(Variant {
                                index: v.index,
                                name: v.name.clone(),
                                fields: fields(&v.fields)?,
                                docs: v.docs.clone(),
                            })
                        })
                        .collect::<Result<Vec<_>, RegistryError>>()?,
                ),
                portable::TypeDef::Sequence { type_param } => {
                    TypeDefinition::Sequence(lookup(type_param)?)
                }
                portable::TypeDef::Array { len, type_param } => TypeDefinition::Array {
                    element: lookup(type_param)?,
                    len: *len,
                },
                portable::TypeDef::Tuple { fields } if fields.is_empty() => TypeDefinition::Void,
                portable::TypeDef::Tuple { fields } => TypeDefinition::Tuple(
                    fields.iter().map(lookup).collect::<Result<Vec<_>, _>>()?,
                ),
                portable::TypeDef::Primitive(p) => TypeDefinition::Primitive((*p).into()),
                portable::TypeDef::Compact { type_param } => {
                    TypeDefinition::Compact(lookup(type_param)?)
                }
                portable::TypeDef::BitSequence {
                    bit_store_type,
                    bit_order_type,
                } => {
                    let order_ty = by_wire.get(&bit_order_type.0).ok_or(
                        RegistryError::TypeNotFound {
                            id: bit_order_type.0,
                            referenced_by: ty.id,
                        },
                    )?;
                    let order = match order_ty.path.last().map(|s| s.as_str()) {
                        Some("Lsb0") => BitOrder::Lsb0,
                        Some("Msb0") => BitOrder::Msb0,
                        _ => return Err(RegistryError::InvalidBitOrder(bit_order_type.0)),
                    };

                    TypeDefinition::BitSequence {
                        store: lookup(bit_store_type)?,
                        order,
                    }
                }
            };

            let params = ty
                .ty
                .type_params
                .iter()
                .map(|p| {
                    Ok(TypeParam {
                        name: p.name.clone(),
                        ty: p.ty.as_ref().map(lookup).transpose()?,
                    })
                })
                .collect::<Result<Vec<_>, RegistryError>>()?;

            builder.define(
                ids[&ty.id],
                TypeEntry {
                    path: ty.ty.path.clone(),
                    params,
                    def,
                    docs: ty.ty.docs.clone(),
                },
            )?;
        }

        Ok(WireRegistry {
            registry: builder.build()?,
            ids,
        })
    }
    /// Translates a wire identifier into its arena identifier.
    pub fn lookup(&self, wire: u32) -> Option<TypeId> {
        self.ids.get(&wire).copied()
    }
}
