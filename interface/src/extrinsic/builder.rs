use super::extensions::{encode_extensions, ExtensionParams, SignedExtensions};
use super::{Era, Extrinsic, EXTRINSIC_VERSION, SIGNED_BIT};
use crate::codec::Encoder;
use crate::common::Hash;
use crate::metadata::{Metadata, TypeDefinition};
use crate::signer::{sign_with, Signature, Signer};
use crate::value::{encode_value, Value};
use crate::{blake2b, Error, Result};
use log::debug;
use parity_scale_codec::Encode;

/// The payload handed to the signer: the call, followed by the extra and
/// additional data of the signed extensions. Payloads longer than 256 bytes
/// are replaced by their blake2b hash.
pub fn signing_payload(call: &[u8], extensions: &SignedExtensions) -> Vec<u8> {
    let mut payload = Vec::with_capacity(call.len() + extensions.extra.len() + extensions.additional.len());
    payload.extend_from_slice(call);
    payload.extend_from_slice(&extensions.extra);
    payload.extend_from_slice(&extensions.additional);

    if payload.len() > 256 {
        blake2b(&payload).to_vec()
    } else {
        payload
    }
}

/// Prefixes an extrinsic body with its compact encoded length.
fn envelope(body: Vec<u8>) -> Extrinsic {
    let mut out = parity_scale_codec::Compact(body.len() as u32).encode();
    out.extend(body);
    Extrinsic::from_bytes(out)
}

/// Creates an unsigned extrinsic from an encoded call.
pub fn unsigned_extrinsic(call: &[u8]) -> Extrinsic {
    let mut body = Vec::with_capacity(call.len() + 1);
    body.push(EXTRINSIC_VERSION);
    body.extend_from_slice(call);
    envelope(body)
}

/// Builder type for creating signed extrinsics.
///
/// # Example
///
/// ```no_run
/// # let metadata: tessera::metadata::Metadata = unimplemented!();
/// # let signer: Box<dyn tessera::signer::Signer> = unimplemented!();
/// use tessera::calls::encode_call;
/// use tessera::extrinsic::{Era, SignedExtrinsicBuilder};
/// use tessera::value::Value;
///
/// let call = encode_call(
///     &metadata,
///     "System",
///     &Value::named_variant("remark", [("remark", Value::bytes(b"hello"))]),
/// )
/// .unwrap();
///
/// let extrinsic = SignedExtrinsicBuilder::new(&metadata)
///     .signer(signer.as_ref())
///     .call(call)
///     .nonce(0)
///     .spec_version(9430)
///     .transaction_version(24)
///     .genesis_hash([0; 32])
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SignedExtrinsicBuilder<'a> {
    metadata: &'a Metadata,
    signer: Option<&'a dyn Signer>,
    call: Option<Vec<u8>>,
    nonce: Option<u64>,
    tip: u128,
    era: Era,
    era_block_hash: Option<Hash>,
    spec_version: Option<u32>,
    transaction_version: Option<u32>,
    genesis_hash: Option<Hash>,
}

impl<'a> SignedExtrinsicBuilder<'a> {
    pub fn new(metadata: &'a Metadata) -> Self {
        SignedExtrinsicBuilder {
            metadata,
            signer: None,
            call: None,
            nonce: None,
            tip: 0,
            era: Era::Immortal,
            era_block_hash: None,
            spec_version: None,
            transaction_version: None,
            genesis_hash: None,
        }
    }
    pub fn signer(self, signer: &'a dyn Signer) -> Self {
        Self {
            signer: Some(signer),
            ..self
        }
    }
    /// Set the encoded call, as returned by [`encode_call`](crate::calls::encode_call)
    /// or a [`CallApi`](crate::api::CallApi).
    pub fn call(self, call: Vec<u8>) -> Self {
        Self {
            call: Some(call),
            ..self
        }
    }
    /// Set the nonce of the transaction. Pending transactions of the signer
    /// must be accounted for.
    pub fn nonce(self, nonce: u64) -> Self {
        Self {
            nonce: Some(nonce),
            ..self
        }
    }
    pub fn tip(self, tip: u128) -> Self {
        Self { tip, ..self }
    }
    /// Make the transaction valid for `period` blocks, starting at the block
    /// `number` with hash `hash`. Immortal by default.
    pub fn mortal(self, period: u64, number: u64, hash: Hash) -> Self {
        Self {
            era: Era::mortal(period, number),
            era_block_hash: Some(hash),
            ..self
        }
    }
    pub fn immortal(self) -> Self {
        Self {
            era: Era::Immortal,
            era_block_hash: None,
            ..self
        }
    }
    pub fn spec_version(self, version: u32) -> Self {
        Self {
            spec_version: Some(version),
            ..self
        }
    }
    pub fn transaction_version(self, version: u32) -> Self {
        Self {
            transaction_version: Some(version),
            ..self
        }
    }
    pub fn genesis_hash(self, hash: Hash) -> Self {
        Self {
            genesis_hash: Some(hash),
            ..self
        }
    }
    pub fn build(self) -> Result<Extrinsic> {
        let signer = self.signer.ok_or(Error::BuilderMissingField("signer"))?;
        let call = self.call.ok_or(Error::BuilderMissingField("call"))?;
        let nonce = self.nonce.ok_or(Error::BuilderMissingField("nonce"))?;
        let spec_version = self
            .spec_version
            .ok_or(Error::BuilderMissingField("spec_version"))?;
        let transaction_version = self
            .transaction_version
            .ok_or(Error::BuilderMissingField("transaction_version"))?;
        let genesis_hash = self
            .genesis_hash
            .ok_or(Error::BuilderMissingField("genesis_hash"))?;

        let version = self.metadata.extrinsic().version;
        if version != EXTRINSIC_VERSION {
            return Err(Error::UnsupportedExtrinsicVersion(version));
        }

        // Immortal transactions start at genesis.
        let era_block_hash = match self.era {
            Era::Immortal => genesis_hash,
            Era::Mortal { .. } => self
                .era_block_hash
                .ok_or(Error::BuilderMissingField("era_block_hash"))?,
        };

        let params = ExtensionParams {
            spec_version,
            transaction_version,
            genesis_hash,
            era: self.era,
            era_block_hash,
            nonce,
            tip: self.tip,
        };
        let extensions = encode_extensions(self.metadata, &params)?;

        let payload = signing_payload(&call, &extensions);
        let signature = sign_with(signer, &payload)?;

        let mut body = Encoder::new();
        body.push_byte(EXTRINSIC_VERSION | SIGNED_BIT);
        encode_address(self.metadata, signer, &mut body)?;
        encode_signature(self.metadata, &signature, &mut body)?;
        body.push_bytes(&extensions.extra);
        body.push_bytes(&call);

        let extrinsic = envelope(body.into_inner());
        debug!(
            "Built signed extrinsic 0x{} with nonce {} ({} bytes)",
            hex::encode(extrinsic.hash()),
            nonce,
            extrinsic.len()
        );

        Ok(extrinsic)
    }
}

// Chains either use `MultiAddress` or the plain account as address.
fn encode_address(metadata: &Metadata, signer: &dyn Signer, out: &mut Encoder) -> Result<()> {
    let ty = match metadata.extrinsic().address_ty {
        Some(ty) => ty,
        None => {
            out.push_bytes(&signer.address().encode());
            return Ok(());
        }
    };

    let value = match metadata.types().resolve(ty) {
        Some(TypeDefinition::Variant(_)) => signer.address().to_value(),
        _ => signer.account_id().to_value(),
    };
    Ok(encode_value(out, &value, ty, metadata.types())?)
}

// Chains either use `MultiSignature` or a single signature type.
fn encode_signature(metadata: &Metadata, signature: &Signature, out: &mut Encoder) -> Result<()> {
    let ty = match metadata.extrinsic().signature_ty {
        Some(ty) => ty,
        None => {
            out.push_byte(signature.algorithm.index());
            out.push_bytes(&signature.bytes);
            return Ok(());
        }
    };

    let value = match metadata.types().resolve(ty) {
        Some(TypeDefinition::Variant(_)) => signature.to_value(),
        _ => Value::bytes(&signature.bytes),
    };
    Ok(encode_value(out, &value, ty, metadata.types())?)
}
