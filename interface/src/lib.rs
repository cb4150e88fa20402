//! Dynamic and static interfaces for Substrate based blockchains.
//!
//! The runtime of a chain describes itself through its metadata. `tessera`
//! parses that description into a type [`Registry`](metadata::Registry) and
//! offers two ways of talking to the chain:
//!
//! * the dynamic path, where calls, events and storage values are [`Value`]s
//!   encoded and decoded by walking the registry, and
//! * the static path, where Rust types describe their own shape through
//!   [`IdentifiableType`](static_type::IdentifiableType) and are validated
//!   against the registry before they are used with `parity-scale-codec`.
//!
//! # Example
//!
//! ```no_run
//! use tessera::metadata::parse_hex_metadata;
//! use tessera::storage::StorageKey;
//! use tessera::value::Value;
//!
//! let metadata = parse_hex_metadata(std::fs::read("metadata.hex").unwrap()).unwrap();
//!
//! let key = StorageKey::new(
//!     &metadata,
//!     "System",
//!     "Account",
//!     &[Value::unnamed_variant("Id", [Value::bytes([0u8; 32])])],
//! )
//! .unwrap();
//!
//! println!("0x{}", hex::encode(key.to_bytes()));
//! ```

// The derive emits `::tessera::..` paths, which must also resolve inside of
// this crate.
extern crate self as tessera;

pub use tessera_metadata as metadata;

pub mod api;
pub mod bits;
pub mod calls;
pub mod client;
pub mod codec;
pub mod common;
pub mod config;
pub mod constants;
pub mod events;
pub mod extrinsic;
pub mod num;
pub mod rpc;
pub mod runtime_api;
pub mod signer;
pub mod static_type;
pub mod storage;
pub mod value;

pub use client::Client;
pub use value::Value;

/// Re-export of the [`parity-scale-codec`](https://crates.io/crates/parity-scale-codec) crate.
pub mod scale {
    pub use parity_scale_codec::*;
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("builder is missing field: {0}")]
    BuilderMissingField(&'static str),
    #[error(transparent)]
    Metadata(#[from] metadata::Error),
    #[error(transparent)]
    Codec(#[from] codec::CodecError),
    #[error(transparent)]
    Scale(#[from] parity_scale_codec::Error),
    #[error(transparent)]
    TypeMismatch(#[from] static_type::TypeMismatch),
    #[error(transparent)]
    Storage(#[from] storage::StorageError),
    #[error(transparent)]
    Ss58(#[from] common::ss58format::Ss58Error),
    #[error("failed to parse chain configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("pallet {0} not found")]
    PalletNotFound(String),
    #[error("{kind} {name} not found in pallet {pallet}")]
    ItemNotFound {
        kind: &'static str,
        pallet: String,
        name: String,
    },
    #[error("runtime API {api}_{method} not found")]
    RuntimeApiNotFound { api: String, method: String },
    #[error("storage item {entry} is hashed with {expected:?}, not {found:?}")]
    HasherMismatch {
        entry: String,
        expected: Vec<metadata::StorageHasher>,
        found: Vec<metadata::StorageHasher>,
    },
    #[error("runtime API {0} expects {1} arguments, got {2}")]
    RuntimeApiArity(String, usize, usize),
    #[error("metadata does not describe {0}")]
    MissingMetadataType(&'static str),
    #[error("{item} is not {expected}")]
    UnexpectedShape { item: &'static str, expected: &'static str },
    #[error("unknown pallet index {0}")]
    UnknownPalletIndex(u8),
    #[error("signed extension {0} is not supported")]
    UnknownSignedExtension(String),
    #[error("unsupported extrinsic version {0}")]
    UnsupportedExtrinsicVersion(u8),
    #[error("signer failed: {0}")]
    Signer(String),
    #[error("RPC request failed: {0}")]
    Rpc(#[source] rpc::RpcError),
    #[error("transaction stream ended before a terminal status")]
    TransactionStreamEnded,
    #[error("transaction ended with status {0:?}")]
    TransactionFailed(rpc::TransactionStatus),
}

/// Blake2b hash with 256-bit output, used for extrinsic hashes and large
/// signing payloads.
pub fn blake2b(data: &[u8]) -> [u8; 32] {
    metadata::hasher::blake2_256(data)
}
