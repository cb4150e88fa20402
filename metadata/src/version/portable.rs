//! Wire layout of the portable type registry embedded in V14+ metadata.

use parity_scale_codec::{Decode, Encode};

/// Reference to a type of the portable registry. Encoded as a compact
/// integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub struct TypeRef(#[codec(compact)] pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PortableRegistry {
    pub types: Vec<PortableType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PortableType {
    #[codec(compact)]
    pub id: u32,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Type {
    pub path: Vec<String>,
    pub type_params: Vec<TypeParameter>,
    pub type_def: TypeDef,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TypeParameter {
    pub name: String,
    pub ty: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum TypeDef {
    Composite {
        fields: Vec<Field>,
    },
    Variant {
        variants: Vec<Variant>,
    },
    Sequence {
        type_param: TypeRef,
    },
    Array {
        len: u32,
        type_param: TypeRef,
    },
    Tuple {
        fields: Vec<TypeRef>,
    },
    Primitive(TypeDefPrimitive),
    Compact {
        type_param: TypeRef,
    },
    BitSequence {
        bit_store_type: TypeRef,
        bit_order_type: TypeRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum TypeDefPrimitive {
    Bool,
    Char,
    Str,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    I8,
    I16,
    I32,
    I64,
    I128,
    I256,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Field {
    pub name: Option<String>,
    pub ty: TypeRef,
    pub type_name: Option<String>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Variant {
    pub name: String,
    pub fields: Vec<Field>,
    pub index: u8,
    pub docs: Vec<String>,
}
