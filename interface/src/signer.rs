//! The signing boundary.
//!
//! Key storage and the signature schemes themselves are left to
//! implementations of [`Signer`]; this crate only hands over the payload and
//! places the returned signature into the extrinsic.

use crate::common::{AccountId32, MultiAddress};
use crate::value::Value;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Ed25519,
    Sr25519,
    Ecdsa,
}

impl SignatureAlgorithm {
    /// Name of the matching `MultiSignature` arm.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "Ed25519",
            SignatureAlgorithm::Sr25519 => "Sr25519",
            SignatureAlgorithm::Ecdsa => "Ecdsa",
        }
    }
    /// Index of the matching `MultiSignature` arm.
    pub fn index(&self) -> u8 {
        match self {
            SignatureAlgorithm::Ed25519 => 0,
            SignatureAlgorithm::Sr25519 => 1,
            SignatureAlgorithm::Ecdsa => 2,
        }
    }
    pub fn signature_len(&self) -> usize {
        match self {
            SignatureAlgorithm::Ed25519 | SignatureAlgorithm::Sr25519 => 64,
            SignatureAlgorithm::Ecdsa => 65,
        }
    }
}

/// Raw signature bytes tagged with the algorithm that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub algorithm: SignatureAlgorithm,
    pub bytes: Vec<u8>,
}

impl Signature {
    /// The signature as `MultiSignature` value.
    pub fn to_value(&self) -> Value {
        Value::unnamed_variant(self.algorithm.name(), [Value::bytes(&self.bytes)])
    }
}

/// Signs extrinsic payloads on behalf of an account.
pub trait Signer: Send + Sync {
    /// The account of the public key. For ECDSA keys, the blake2b hash of
    /// the compressed public key.
    fn account_id(&self) -> AccountId32;
    fn address(&self) -> MultiAddress {
        self.account_id().into()
    }
    fn algorithm(&self) -> SignatureAlgorithm;
    /// Signs the payload, returning the raw signature bytes.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Signs `payload`, checking the length of the returned signature.
pub fn sign_with(signer: &dyn Signer, payload: &[u8]) -> Result<Signature> {
    let algorithm = signer.algorithm();
    let bytes = signer.sign(payload)?;

    if bytes.len() != algorithm.signature_len() {
        return Err(crate::Error::Signer(format!(
            "{} signature must be {} bytes, got {}",
            algorithm.name(),
            algorithm.signature_len(),
            bytes.len()
        )));
    }

    Ok(Signature { algorithm, bytes })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records payloads and "signs" them with their blake2b hash.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSigner {
        pub account: [u8; 32],
        pub payloads: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingSigner {
        pub(crate) fn new(account: [u8; 32]) -> Self {
            RecordingSigner {
                account,
                payloads: Default::default(),
            }
        }
    }

    impl Signer for RecordingSigner {
        fn account_id(&self) -> AccountId32 {
            AccountId32(self.account)
        }
        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::Sr25519
        }
        fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
            self.payloads.lock().unwrap().push(payload.to_vec());

            let hash = crate::blake2b(payload);
            Ok([hash, hash].concat())
        }
    }

    struct ShortSigner;

    impl Signer for ShortSigner {
        fn account_id(&self) -> AccountId32 {
            AccountId32([0; 32])
        }
        fn algorithm(&self) -> SignatureAlgorithm {
            SignatureAlgorithm::Ecdsa
        }
        fn sign(&self, _: &[u8]) -> Result<Vec<u8>> {
            Ok(vec![0; 64])
        }
    }

    #[test]
    fn signatures_are_checked() {
        let signer = RecordingSigner::new([1; 32]);
        let signature = sign_with(&signer, b"payload").unwrap();

        assert_eq!(signature.bytes.len(), 64);
        assert_eq!(signature.to_value().variant_name(), Some("Sr25519"));
        assert_eq!(signer.payloads.lock().unwrap().as_slice(), &[b"payload".to_vec()]);
        assert_eq!(signer.address(), MultiAddress::Id(AccountId32([1; 32])));

        assert!(matches!(sign_with(&ShortSigner, b""), Err(crate::Error::Signer(_))));
    }
}
