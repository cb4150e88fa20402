//! The transport boundary.
//!
//! `tessera` does not speak JSON-RPC itself. A [`RpcClient`] implementation
//! performs the `state_*` and `author_*` requests of a node, while the
//! [`Client`](crate::Client) prepares the keys, calls and extrinsics that
//! are passed through it.

use crate::common::Hash;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Opaque transport error.
pub type RpcError = Box<dyn std::error::Error + Send + Sync>;

pub type StatusStream = BoxStream<'static, std::result::Result<TransactionStatus, RpcError>>;

#[async_trait]
pub trait RpcClient: Send + Sync {
    /// `state_getMetadata`, the raw (SCALE encoded) metadata.
    async fn metadata(&self, at: Option<Hash>) -> std::result::Result<Vec<u8>, RpcError>;
    /// `state_getStorage`.
    async fn storage(&self, key: &[u8], at: Option<Hash>) -> std::result::Result<Option<Vec<u8>>, RpcError>;
    /// `state_getKeysPaged`, up to `count` keys starting with `prefix`
    /// following `start_key`.
    async fn storage_keys_paged(
        &self,
        prefix: &[u8],
        count: u32,
        start_key: Option<&[u8]>,
        at: Option<Hash>,
    ) -> std::result::Result<Vec<Vec<u8>>, RpcError>;
    /// `state_call`, the raw output of a runtime API function.
    async fn state_call(&self, function: &str, args: &[u8], at: Option<Hash>) -> std::result::Result<Vec<u8>, RpcError>;
    /// `author_submitExtrinsic`, returning the transaction hash.
    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> std::result::Result<Hash, RpcError>;
    /// `author_submitAndWatchExtrinsic`.
    async fn watch_extrinsic(&self, extrinsic: &[u8]) -> std::result::Result<StatusStream, RpcError>;
}

/// Status updates of a watched transaction, in the JSON representation used
/// by Substrate nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Future,
    Ready,
    Broadcast(Vec<String>),
    InBlock(#[serde(with = "hex_hash")] Hash),
    Retracted(#[serde(with = "hex_hash")] Hash),
    FinalityTimeout(#[serde(with = "hex_hash")] Hash),
    Finalized(#[serde(with = "hex_hash")] Hash),
    Usurped(#[serde(with = "hex_hash")] Hash),
    Dropped,
    Invalid,
}

impl TransactionStatus {
    /// Whether no further updates follow this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::FinalityTimeout(_)
                | TransactionStatus::Finalized(_)
                | TransactionStatus::Usurped(_)
                | TransactionStatus::Dropped
                | TransactionStatus::Invalid
        )
    }
}

mod hex_hash {
    use crate::common::Hash;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(hash)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(D::Error::custom)?;

        bytes
            .try_into()
            .map_err(|b: Vec<u8>| D::Error::custom(format!("expected 32 byte hash, got {} bytes", b.len())))
    }
}

/// The status updates of a submitted transaction. Ends after the first
/// terminal status.
pub struct TransactionProgress {
    hash: Hash,
    // `None` once the stream has ended. The transport stream is never polled
    // again after that.
    inner: Option<StatusStream>,
}

impl TransactionProgress {
    pub fn new(hash: Hash, inner: StatusStream) -> Self {
        TransactionProgress {
            hash,
            inner: Some(inner),
        }
    }
    /// Hash of the watched transaction.
    pub fn hash(&self) -> Hash {
        self.hash
    }
    /// Waits until the transaction is finalized, returning the hash of the
    /// block it was finalized in.
    pub async fn wait_for_finalized(mut self) -> Result<Hash> {
        while let Some(status) = self.next().await {
            match status.map_err(Error::Rpc)? {
                TransactionStatus::Finalized(block) => return Ok(block),
                status if status.is_terminal() => return Err(Error::TransactionFailed(status)),
                _ => {}
            }
        }

        Err(Error::TransactionStreamEnded)
    }
    /// Waits until the transaction is included in a block, which might still
    /// be retracted.
    pub async fn wait_for_in_block(mut self) -> Result<Hash> {
        while let Some(status) = self.next().await {
            match status.map_err(Error::Rpc)? {
                TransactionStatus::InBlock(block) | TransactionStatus::Finalized(block) => return Ok(block),
                status if status.is_terminal() => return Err(Error::TransactionFailed(status)),
                _ => {}
            }
        }

        Err(Error::TransactionStreamEnded)
    }
}

impl Stream for TransactionProgress {
    type Item = std::result::Result<TransactionStatus, RpcError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let inner = match this.inner.as_mut() {
            Some(inner) => inner,
            None => return Poll::Ready(None),
        };

        let item = match inner.poll_next_unpin(cx) {
            Poll::Ready(item) => item,
            Poll::Pending => return Poll::Pending,
        };

        let done = match &item {
            Some(Ok(status)) => {
                trace!("Transaction 0x{}: {:?}", hex::encode(this.hash), status);
                status.is_terminal()
            }
            Some(Err(err)) => {
                warn!("Status stream of 0x{} failed: {}", hex::encode(this.hash), err);
                true
            }
            None => true,
        };
        if done {
            this.inner = None;
        }

        Poll::Ready(item)
    }
}

impl std::fmt::Debug for TransactionProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionProgress")
            .field("hash", &hex::encode(self.hash))
            .field("done", &self.inner.is_none())
            .finish()
    }
}
