//! The dynamic value model.
//!
//! A [`Value`] can represent any datum described by a type registry. Values
//! built by hand carry no context (`Value<()>`), values produced by decoding
//! carry the [`TypeId`](crate::metadata::TypeId) they were decoded as.
//!
//! ```
//! use tessera::value::Value;
//!
//! let transfer = Value::named_variant(
//!     "transfer_keep_alive",
//!     [
//!         ("dest", Value::unnamed_variant("Id", [Value::bytes([1u8; 32])])),
//!         ("value", Value::u128(10_000_000_000)),
//!     ],
//! );
//!
//! assert_eq!(transfer.variant_name(), Some("transfer_keep_alive"));
//! assert_eq!(transfer.at("value").and_then(|v| v.as_u128()), Some(10_000_000_000));
//! ```

use crate::bits::BitSequence;
use crate::num::{I512, U512};

mod decode;
mod encode;

pub use decode::decode_value;
pub use encode::encode_value;

/// A dynamic datum paired with a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Value<C = ()> {
    pub value: ValueDef<C>,
    pub context: C,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueDef<C> {
    Bool(bool),
    Char(char),
    String(String),
    UInt(U512),
    Int(I512),
    /// Sequences and arrays of `u8`.
    Bytes(Vec<u8>),
    Sequence(Vec<Value<C>>),
    /// Named fields, in wire order.
    Map(Vec<(String, Value<C>)>),
    BitSequence(BitSequence),
    Variant(Variant<C>),
    Nil,
}

/// An enum arm together with its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant<C> {
    pub name: String,
    pub fields: Composite<C>,
}

/// The fields of a variant, either named or positional.
#[derive(Debug, Clone, PartialEq)]
pub enum Composite<C> {
    Named(Vec<(String, Value<C>)>),
    Unnamed(Vec<Value<C>>),
}

impl<C> Composite<C> {
    pub fn len(&self) -> usize {
        match self {
            Composite::Named(fields) => fields.len(),
            Composite::Unnamed(fields) => fields.len(),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// The field values in order, dropping names.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value<C>> + '_> {
        match self {
            Composite::Named(fields) => Box::new(fields.iter().map(|(_, v)| v)),
            Composite::Unnamed(fields) => Box::new(fields.iter()),
        }
    }
    pub fn get(&self, name: &str) -> Option<&Value<C>> {
        match self {
            Composite::Named(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            Composite::Unnamed(_) => None,
        }
    }
    pub fn map_context<D, F: FnMut(C) -> D + Clone>(self, f: F) -> Composite<D> {
        match self {
            Composite::Named(fields) => Composite::Named(
                fields
                    .into_iter()
                    .map(|(n, v)| (n, v.map_context(f.clone())))
                    .collect(),
            ),
            Composite::Unnamed(fields) => Composite::Unnamed(
                fields
                    .into_iter()
                    .map(|v| v.map_context(f.clone()))
                    .collect(),
            ),
        }
    }
}

impl Value<()> {
    fn new(value: ValueDef<()>) -> Self {
        Value { value, context: () }
    }
    pub fn bool(val: bool) -> Self {
        Self::new(ValueDef::Bool(val))
    }
    pub fn char(val: char) -> Self {
        Self::new(ValueDef::Char(val))
    }
    pub fn string<S: Into<String>>(val: S) -> Self {
        Self::new(ValueDef::String(val.into()))
    }
    pub fn u128(val: u128) -> Self {
        Self::new(ValueDef::UInt(U512::from(val)))
    }
    pub fn uint<T: Into<U512>>(val: T) -> Self {
        Self::new(ValueDef::UInt(val.into()))
    }
    pub fn i128(val: i128) -> Self {
        Self::new(ValueDef::Int(I512::from(val)))
    }
    pub fn int<T: Into<I512>>(val: T) -> Self {
        Self::new(ValueDef::Int(val.into()))
    }
    pub fn bytes<B: AsRef<[u8]>>(val: B) -> Self {
        Self::new(ValueDef::Bytes(val.as_ref().to_vec()))
    }
    pub fn sequence<I: IntoIterator<Item = Value>>(vals: I) -> Self {
        Self::new(ValueDef::Sequence(vals.into_iter().collect()))
    }
    /// A composite with named fields.
    pub fn named<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self::new(ValueDef::Map(
            fields.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        ))
    }
    pub fn variant<S: Into<String>>(name: S, fields: Composite<()>) -> Self {
        Self::new(ValueDef::Variant(Variant {
            name: name.into(),
            fields,
        }))
    }
    pub fn unnamed_variant<S, I>(name: S, fields: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Value>,
    {
        Self::variant(name, Composite::Unnamed(fields.into_iter().collect()))
    }
    pub fn named_variant<S, I, F>(name: S, fields: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (F, Value)>,
        F: Into<String>,
    {
        Self::variant(
            name,
            Composite::Named(fields.into_iter().map(|(n, v)| (n.into(), v)).collect()),
        )
    }
    pub fn bit_sequence(bits: BitSequence) -> Self {
        Self::new(ValueDef::BitSequence(bits))
    }
    pub fn nil() -> Self {
        Self::new(ValueDef::Nil)
    }
}

impl<C> Value<C> {
    pub fn map_context<D, F: FnMut(C) -> D + Clone>(self, mut f: F) -> Value<D> {
        let context = f(self.context);
        let value = match self.value {
            ValueDef::Bool(v) => ValueDef::Bool(v),
            ValueDef::Char(v) => ValueDef::Char(v),
            ValueDef::String(v) => ValueDef::String(v),
            ValueDef::UInt(v) => ValueDef::UInt(v),
            ValueDef::Int(v) => ValueDef::Int(v),
            ValueDef::Bytes(v) => ValueDef::Bytes(v),
            ValueDef::Sequence(vals) => ValueDef::Sequence(
                vals.into_iter().map(|v| v.map_context(f.clone())).collect(),
            ),
            ValueDef::Map(fields) => ValueDef::Map(
                fields
                    .into_iter()
                    .map(|(n, v)| (n, v.map_context(f.clone())))
                    .collect(),
            ),
            ValueDef::BitSequence(bits) => ValueDef::BitSequence(bits),
            ValueDef::Variant(var) => ValueDef::Variant(Variant {
                name: var.name,
                fields: var.fields.map_context(f),
            }),
            ValueDef::Nil => ValueDef::Nil,
        };

        Value { value, context }
    }
    pub fn remove_context(self) -> Value<()> {
        self.map_context(|_| ())
    }
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match &self.value {
            ValueDef::Bool(_) => "bool",
            ValueDef::Char(_) => "char",
            ValueDef::String(_) => "string",
            ValueDef::UInt(_) => "unsigned integer",
            ValueDef::Int(_) => "signed integer",
            ValueDef::Bytes(_) => "bytes",
            ValueDef::Sequence(_) => "sequence",
            ValueDef::Map(_) => "map",
            ValueDef::BitSequence(_) => "bit sequence",
            ValueDef::Variant(_) => "variant",
            ValueDef::Nil => "nil",
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            ValueDef::Bool(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ValueDef::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
    pub fn as_uint(&self) -> Option<U512> {
        match &self.value {
            ValueDef::UInt(v) => Some(*v),
            ValueDef::Int(v) if !v.is_negative() => Some(v.magnitude()),
            _ => None,
        }
    }
    pub fn as_u128(&self) -> Option<u128> {
        self.as_uint()
            .filter(|v| v.bits() <= 128)
            .map(|v| v.low_u128())
    }
    pub fn as_i128(&self) -> Option<i128> {
        match &self.value {
            ValueDef::Int(v) => v.to_i128(),
            ValueDef::UInt(v) if v.bits() < 128 => Some(v.low_u128() as i128),
            _ => None,
        }
    }
    /// Bytes, also accepting sequences of small unsigned integers.
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match &self.value {
            ValueDef::Bytes(b) => Some(b.clone()),
            ValueDef::Sequence(vals) => vals
                .iter()
                .map(|v| v.as_uint().filter(|v| v.bits() <= 8).map(|v| v.low_u32() as u8))
                .collect(),
            _ => None,
        }
    }
    pub fn as_variant(&self) -> Option<&Variant<C>> {
        match &self.value {
            ValueDef::Variant(v) => Some(v),
            _ => None,
        }
    }
    pub fn variant_name(&self) -> Option<&str> {
        self.as_variant().map(|v| v.name.as_str())
    }
    /// A named field of a map or of a variant with named fields.
    pub fn at(&self, name: &str) -> Option<&Value<C>> {
        match &self.value {
            ValueDef::Map(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            ValueDef::Variant(v) => v.fields.get(name),
            _ => None,
        }
    }
    /// A positional element of a sequence, map or variant.
    pub fn index(&self, idx: usize) -> Option<&Value<C>> {
        match &self.value {
            ValueDef::Sequence(vals) => vals.get(idx),
            ValueDef::Map(fields) => fields.get(idx).map(|(_, v)| v),
            ValueDef::Variant(v) => v.fields.values().nth(idx),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::bool(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::string(val)
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::string(val)
    }
}

impl From<Vec<u8>> for Value {
    fn from(val: Vec<u8>) -> Self {
        Value::new(ValueDef::Bytes(val))
    }
}

macro_rules! impl_from_int {
    ($ctor:ident, $($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(val: $ty) -> Self {
                    Value::$ctor(val)
                }
            }
        )*
    };
}

impl_from_int!(uint, u8, u16, u32, u64, u128);
impl_from_int!(int, i8, i16, i32, i64, i128);
