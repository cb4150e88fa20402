//! Building and decoding version 4 extrinsics.
//!
//! A signed extrinsic has the layout
//!
//! ```text
//! compact(len) ++ 0x84 ++ address ++ signature ++ extra ++ call
//! ```
//!
//! while an unsigned one is `compact(len) ++ 0x04 ++ call`.

use crate::calls::{decode_call_from, DecodedCall};
use crate::codec::Decoder;
use crate::metadata::{Metadata, TypeId};
use crate::value::{decode_value, Value};
use crate::{blake2b, Error, Result};
use log::trace;

mod builder;
pub mod era;
pub mod extensions;

pub use self::builder::{signing_payload, unsigned_extrinsic, SignedExtrinsicBuilder};
pub use self::era::Era;
pub use self::extensions::{encode_extensions, ExtensionParams, SignedExtensions};

pub const EXTRINSIC_VERSION: u8 = 4;
pub const SIGNED_BIT: u8 = 0b1000_0000;

/// A fully encoded extrinsic, including its length prefix, ready for
/// submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extrinsic {
    bytes: Vec<u8>,
}

impl Extrinsic {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Extrinsic { bytes }
    }
    /// The transaction hash, as reported by nodes.
    pub fn hash(&self) -> [u8; 32] {
        blake2b(&self.bytes)
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.bytes))
    }
}

/// Address, signature and signed extension data of a signed extrinsic.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicSignature {
    pub address: Value<TypeId>,
    pub signature: Value<TypeId>,
    /// Extra data of the signed extensions, in metadata order.
    pub extra: Vec<Value<TypeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedExtrinsic {
    pub signature: Option<ExtrinsicSignature>,
    pub call: DecodedCall,
}

impl DecodedExtrinsic {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Decodes a length prefixed extrinsic, as found in block bodies.
pub fn decode_extrinsic(metadata: &Metadata, bytes: &[u8]) -> Result<DecodedExtrinsic> {
    let mut decoder = Decoder::new(bytes);
    let len = decoder.read_compact_len()?;
    let mut decoder = Decoder::new(decoder.read_bytes(len)?);

    let version = decoder.read_byte()?;
    let is_signed = version & SIGNED_BIT != 0;
    if version & !SIGNED_BIT != EXTRINSIC_VERSION {
        return Err(Error::UnsupportedExtrinsicVersion(version & !SIGNED_BIT));
    }

    let signature = if is_signed {
        Some(decode_signature(metadata, &mut decoder)?)
    } else {
        None
    };

    let call = decode_call_from(metadata, &mut decoder)?;
    decoder.finish()?;

    trace!(
        "Decoded {} extrinsic {}::{}",
        if is_signed { "signed" } else { "unsigned" },
        call.pallet,
        call.name()
    );

    Ok(DecodedExtrinsic { signature, call })
}

fn decode_signature(metadata: &Metadata, decoder: &mut Decoder<'_>) -> Result<ExtrinsicSignature> {
    let ext = metadata.extrinsic();
    let types = metadata.types();

    let address_ty = ext.address_ty.ok_or(Error::MissingMetadataType("extrinsic address"))?;
    let signature_ty = ext
        .signature_ty
        .ok_or(Error::MissingMetadataType("extrinsic signature"))?;

    let address = decode_value(decoder, address_ty, types)?;
    let signature = decode_value(decoder, signature_ty, types)?;

    // The extra type is the tuple of all extension types.
    let extra = ext
        .signed_extensions
        .iter()
        .map(|ext| decode_value(decoder, ext.ty, types))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ExtrinsicSignature {
        address,
        signature,
        extra,
    })
}
