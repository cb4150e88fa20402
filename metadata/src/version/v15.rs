use super::portable::{PortableRegistry, TypeRef};
use super::v14::{
    PalletCallMetadata, PalletConstantMetadata, PalletErrorMetadata, PalletEventMetadata,
    PalletStorageMetadata, SignedExtensionMetadata,
};
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RuntimeMetadataV15 {
    pub types: PortableRegistry,
    pub pallets: Vec<PalletMetadata>,
    pub extrinsic: ExtrinsicMetadata,
    pub ty: TypeRef,
    pub apis: Vec<RuntimeApiMetadata>,
    pub outer_enums: OuterEnums,
    pub custom: CustomMetadata,
}

/// Same as the V14 pallet, with documentation.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PalletMetadata {
    pub name: String,
    pub storage: Option<PalletStorageMetadata>,
    pub calls: Option<PalletCallMetadata>,
    pub event: Option<PalletEventMetadata>,
    pub constants: Vec<PalletConstantMetadata>,
    pub error: Option<PalletErrorMetadata>,
    pub index: u8,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ExtrinsicMetadata {
    pub version: u8,
    pub address_ty: TypeRef,
    pub call_ty: TypeRef,
    pub signature_ty: TypeRef,
    pub extra_ty: TypeRef,
    pub signed_extensions: Vec<SignedExtensionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RuntimeApiMetadata {
    pub name: String,
    pub methods: Vec<RuntimeApiMethodMetadata>,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RuntimeApiMethodMetadata {
    pub name: String,
    pub inputs: Vec<RuntimeApiMethodParamMetadata>,
    pub output: TypeRef,
    pub docs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RuntimeApiMethodParamMetadata {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct OuterEnums {
    pub call_enum_ty: TypeRef,
    pub event_enum_ty: TypeRef,
    pub error_enum_ty: TypeRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct CustomMetadata {
    pub map: BTreeMap<String, CustomValueMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct CustomValueMetadata {
    pub ty: TypeRef,
    pub value: Vec<u8>,
}
