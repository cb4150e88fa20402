use super::portable::{PortableRegistry, TypeRef};
use crate::StorageHasher;
use parity_scale_codec::{Decode, Encode};

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RuntimeMetadataV14 {
    pub types: PortableRegistry,
    pub pallets: Vec<PalletMetadata>,
    pub extrinsic: ExtrinsicMetadata,
    /// The type of the `Runtime`.
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletMetadata {
    pub name: String,
    pub storage: Option<PalletStorageMetadata>,
    pub calls: Option<PalletCallMetadata>,
    pub event: Option<PalletEventMetadata>,
    pub constants: Vec<PalletConstantMetadata>,
    pub error: Option<PalletErrorMetadata>,
    pub index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletStorageMetadata {
    pub prefix: String,
    pub entries: Vec<StorageEntryMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct StorageEntryMetadata {
    pub name: String,
    pub modifier: StorageEntryModifier,
    pub ty: StorageEntryType,
    pub default: Vec<u8>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum StorageEntryModifier {
    Optional,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum StorageEntryType {
    Plain(TypeRef),
    Map {
        hashers: Vec<StorageHasher>,
        key: TypeRef,
        value: TypeRef,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletCallMetadata {
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletEventMetadata {
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletErrorMetadata {
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletConstantMetadata {
    pub name: String,
    pub ty: TypeRef,
    pub value: Vec<u8>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExtrinsicMetadata {
    /// The type of the `UncheckedExtrinsic`. Its generic parameters name the
    /// address, call, signature and extra types.
    pub ty: TypeRef,
    pub version: u8,
    pub signed_extensions: Vec<SignedExtensionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct SignedExtensionMetadata {
    pub identifier: String,
    pub ty: TypeRef,
    pub additional_signed: TypeRef,
}
