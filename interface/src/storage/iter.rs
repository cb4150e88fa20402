use super::{storage_entry, StorageError, StorageKey};
use crate::metadata::{Metadata, StorageEntryMetadata};
use crate::value::Value;

/// Iteration over the entries of a storage map.
///
/// Starts at the root of the map, covering all of its entries. Each call to
/// [`StorageKeyIterator::narrow`] binds the next key, covering only the
/// entries that share it. The [`prefix`](StorageKeyIterator::prefix) is what
/// the node is asked to enumerate keys under.
#[derive(Debug, Clone)]
pub struct StorageKeyIterator<'a> {
    metadata: &'a Metadata,
    entry: &'a StorageEntryMetadata,
    key: StorageKey,
}

impl<'a> StorageKeyIterator<'a> {
    pub fn new(metadata: &'a Metadata, pallet: &str, item: &str) -> Result<Self, StorageError> {
        let entry = storage_entry(metadata, pallet, item)?;
        let key = StorageKey::new::<()>(metadata, pallet, item, &[])?;

        Ok(StorageKeyIterator {
            metadata,
            entry,
            key,
        })
    }
    /// Binds the next key of the map.
    pub fn narrow<C>(&self, key: &Value<C>) -> Result<Self, StorageError> {
        let mut narrowed = self.key.clone();
        narrowed.push(self.entry, self.metadata.types(), key)?;

        Ok(StorageKeyIterator {
            metadata: self.metadata,
            entry: self.entry,
            key: narrowed,
        })
    }
    pub fn prefix(&self) -> Vec<u8> {
        self.key.to_bytes()
    }
    /// Number of keys bound so far.
    pub fn bound(&self) -> usize {
        self.key.components().len()
    }
    /// Number of keys left unbound.
    pub fn remaining(&self) -> usize {
        self.entry.arity() - self.bound()
    }
    pub fn entry(&self) -> &'a StorageEntryMetadata {
        self.entry
    }
    /// Parses a key returned by the node for this prefix.
    pub fn decode_key(&self, raw: &[u8]) -> Result<StorageKey, StorageError> {
        let prefix_name = self
            .metadata
            .pallet_by_name(&self.entry.pallet)
            .map(|p| p.storage_prefix())
            .unwrap_or(&self.entry.pallet);

        let key = StorageKey::decode_entry(self.metadata.types(), prefix_name, self.entry, raw)?;
        if !raw.starts_with(&self.prefix()) {
            return Err(StorageError::PrefixMismatch(format!(
                "{}::{}",
                self.entry.pallet, self.entry.name
            )));
        }

        Ok(key)
    }
}
