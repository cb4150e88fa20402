//! Versioned wire formats of the runtime metadata.
//!
//! Only the versions carrying a portable type registry (V14 and V15) can be
//! ingested. Older versions describe types by their Rust names only and are
//! rejected with [`Error::UnsupportedVersion`](crate::Error::UnsupportedVersion).

use crate::{Error, Result};
use parity_scale_codec::{DecodeAll, Encode};

pub mod portable;
pub mod v14;
pub mod v15;

pub use v14::RuntimeMetadataV14;
pub use v15::RuntimeMetadataV15;

/// The magic number that is prefixed in the runtime metadata returned by the
/// JSON-RPC `state_getMetadata`. 'meta' = 0x6d657461.
pub const MAGIC_NUMBER: &[u8; 4] = b"meta";

/// Decoded runtime metadata of one of the supported versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeMetadata {
    V14(RuntimeMetadataV14),
    V15(RuntimeMetadataV15),
}

impl RuntimeMetadata {
    /// Returns the version number as an integer.
    pub fn version_number(&self) -> u8 {
        match self {
            RuntimeMetadata::V14(_) => 14,
            RuntimeMetadata::V15(_) => 15,
        }
    }
    /// Decodes the metadata, dispatching on the leading version byte. The
    /// magic number is optional.
    pub fn decode_prefixed(raw: &[u8]) -> Result<Self> {
        let slice = raw.strip_prefix(MAGIC_NUMBER).unwrap_or(raw);

        let (version, mut body) = match slice.split_first() {
            Some((version, body)) => (*version, body),
            None => return Err(Error::ParseRawMetadata("missing version byte".into())),
        };

        match version {
            14 => Ok(RuntimeMetadata::V14(RuntimeMetadataV14::decode_all(
                &mut body,
            )?)),
            15 => Ok(RuntimeMetadata::V15(RuntimeMetadataV15::decode_all(
                &mut body,
            )?)),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }
    /// Encodes the metadata including the magic number and version byte.
    pub fn encode_prefixed(&self) -> Vec<u8> {
        let mut enc = MAGIC_NUMBER.to_vec();
        enc.push(self.version_number());

        match self {
            RuntimeMetadata::V14(m) => m.encode_to(&mut enc),
            RuntimeMetadata::V15(m) => m.encode_to(&mut enc),
        }

        enc
    }
}
