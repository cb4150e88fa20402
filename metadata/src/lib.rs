//! Parsing and indexing of Substrate runtime metadata. Re-exported by `tessera`
//! as `tessera::metadata`.
//!
//! # Example
//!
//! ```no_run
//! use tessera_metadata::*;
//!
//! // Parse runtime metadata as returned by `state_getMetadata`.
//! let content = std::fs::read_to_string("metadata_polkadot_9430.hex").unwrap();
//! let metadata = parse_hex_metadata(content).unwrap();
//!
//! // Lookup a call by name.
//! let transfer = metadata.call("Balances", "transfer_keep_alive").unwrap();
//! assert_eq!(transfer.pallet.index(), 5);
//! assert_eq!(transfer.variant.index, 3);
//! ```

use parity_scale_codec::{Decode, Error as ScaleError};
use serde::Deserialize;
use serde_json::Error as SerdeJsonError;

pub mod hasher;
pub mod metadata;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod version;

pub use self::hasher::StorageHasher;
pub use self::metadata::*;
pub use self::registry::{
    BitOrder, Field, Primitive, Registry, RegistryBuilder, RegistryError, TypeDefinition,
    TypeEntry, TypeId, TypeParam, Variant,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when parsing Substrate metadata.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse JSON-RPC response: {0}")]
    ParseJsonRpcMetadata(SerdeJsonError),
    #[error("failed to parse hex metadata: {0}")]
    ParseHexMetadata(hex::FromHexError),
    #[error("failed to decode metadata: {0}")]
    ParseRawMetadata(#[from] ScaleError),
    #[error("metadata version {0} is not supported, expected 14 or 15")]
    UnsupportedVersion(u8),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("type {id} referenced by {owner} is not in the registry")]
    TypeNotFound { id: u32, owner: String },
    #[error("type {ty} used for {owner} is not a variant")]
    NotAVariant { ty: TypeId, owner: String },
    #[error("storage entry {entry} declares {hashers} hashers but its key does not match")]
    StorageKeyArity { entry: String, hashers: usize },
    #[error("pallet {0} is declared more than once")]
    DuplicatePallet(String),
    #[error("pallet {0} not found")]
    PalletNotFound(String),
}

/// Helper type when dealing with the JSON-RPC response returned by
/// Substrates `state_getMetadata`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub result: String,
}

/// Convenience function for parsing the JSON-RPC response returned by
/// Substrates `state_getMetadata`.
///
/// Must fit the [`JsonRpcResponse`] structure.
pub fn parse_jsonrpc_metadata<T: AsRef<[u8]>>(json: T) -> Result<Metadata> {
    let resp = serde_json::from_slice::<JsonRpcResponse>(json.as_ref())
        .map_err(Error::ParseJsonRpcMetadata)?;

    parse_hex_metadata(resp.result.as_bytes())
}

/// Convenience function for parsing the metadata from a HEX representation, as
/// returned by `state_getMetadata`.
pub fn parse_hex_metadata<T: AsRef<[u8]>>(hex: T) -> Result<Metadata> {
    let hex = hex.as_ref();

    // The `hex` crate does not handle `0x`...
    let slice = hex.strip_prefix(b"0x").unwrap_or(hex);

    parse_raw_metadata(hex::decode(slice).map_err(Error::ParseHexMetadata)?)
}

/// Parse the raw Substrate metadata. The `meta` magic number is optional.
pub fn parse_raw_metadata<T: AsRef<[u8]>>(raw: T) -> Result<Metadata> {
    Metadata::from_bytes(raw.as_ref())
}

/// Parses metadata as returned by the `Metadata_metadata_at_version` runtime
/// API, where the blob is wrapped in an `Option<Vec<u8>>`.
pub fn parse_opaque_metadata<T: AsRef<[u8]>>(raw: T) -> Result<Option<Metadata>> {
    let mut slice = raw.as_ref();

    match Option::<Vec<u8>>::decode(&mut slice)? {
        Some(inner) => Metadata::from_bytes(&inner).map(Some),
        None => Ok(None),
    }
}
