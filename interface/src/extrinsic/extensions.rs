//! Signed extensions, the per chain data bound into signed extrinsics.
//!
//! Each extension contributes "extra" data, included in the extrinsic, and
//! "additional" data, only included in the signed payload. Which extensions
//! a chain uses, and in which order, is declared by its metadata.

use super::Era;
use crate::common::Hash;
use crate::metadata::{Metadata, Registry, TypeDefinition, TypeId};
use crate::{Error, Result};
use log::trace;
use parity_scale_codec::{Compact, Encode};

/// The values signed extensions are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionParams {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: Hash,
    pub era: Era,
    /// Hash of the block the era starts at. The genesis hash for immortal
    /// transactions.
    pub era_block_hash: Hash,
    pub nonce: u64,
    pub tip: u128,
}

/// Encoded extra and additional data of all extensions, in metadata order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedExtensions {
    pub extra: Vec<u8>,
    pub additional: Vec<u8>,
}

/// Encodes the signed extensions declared by the metadata.
///
/// Unknown extensions are accepted as long as they carry no data.
pub fn encode_extensions(metadata: &Metadata, params: &ExtensionParams) -> Result<SignedExtensions> {
    let types = metadata.types();
    let mut out = SignedExtensions::default();

    for ext in &metadata.extrinsic().signed_extensions {
        let (extra, additional) = match ext.identifier.as_str() {
            "CheckNonZeroSender" | "CheckWeight" => (vec![], vec![]),
            "CheckSpecVersion" => (vec![], params.spec_version.encode()),
            "CheckTxVersion" => (vec![], params.transaction_version.encode()),
            "CheckGenesis" => (vec![], params.genesis_hash.to_vec()),
            "CheckMortality" | "CheckEra" => (params.era.encode(), params.era_block_hash.to_vec()),
            "CheckNonce" => (Compact(params.nonce).encode(), vec![]),
            "ChargeTransactionPayment" => (Compact(params.tip).encode(), vec![]),
            // Tip, followed by no asset id, which pays in the native asset.
            "ChargeAssetTxPayment" => ((Compact(params.tip), 0u8).encode(), vec![]),
            // Disabled mode, no metadata hash.
            "CheckMetadataHash" => (vec![0], vec![0]),
            other => {
                if !is_zero_sized(types, ext.ty) || !is_zero_sized(types, ext.additional_signed) {
                    return Err(Error::UnknownSignedExtension(other.to_string()));
                }

                (vec![], vec![])
            }
        };

        trace!(
            "Signed extension {}: extra 0x{}, additional 0x{}",
            ext.identifier,
            hex::encode(&extra),
            hex::encode(&additional)
        );

        out.extra.extend(extra);
        out.additional.extend(additional);
    }

    Ok(out)
}

/// Whether values of `ty` always encode to nothing.
pub fn is_zero_sized(types: &Registry, ty: TypeId) -> bool {
    fn check(types: &Registry, ty: TypeId, depth: usize) -> bool {
        // A type containing itself cannot be zero sized.
        if depth > types.len() {
            return false;
        }

        match types.resolve(ty) {
            Some(TypeDefinition::Void) => true,
            Some(TypeDefinition::Composite(fields)) => fields.iter().all(|f| check(types, f.ty, depth + 1)),
            Some(TypeDefinition::Tuple(elems)) => elems.iter().all(|ty| check(types, *ty, depth + 1)),
            Some(TypeDefinition::Array { element, len }) => *len == 0 || check(types, *element, depth + 1),
            _ => false,
        }
    }

    check(types, ty, 0)
}
