//! Storage addresses.
//!
//! The value of a storage item lives at
//! `twox128(pallet) ++ twox128(item) ++ hash(key_1) ++ .. ++ hash(key_n)`,
//! where each key is hashed with the hasher the item declares for it. Concat
//! hashers append the encoded key to the hash, which makes the key
//! recoverable from the address.

use crate::codec::{CodecError, Decoder, Encoder};
use crate::metadata::hasher::twox_128;
use crate::metadata::{Metadata, Registry, StorageEntryMetadata, StorageEntryModifier, TypeId};
use crate::value::{decode_value, encode_value, Value};
use log::debug;

mod iter;

pub use iter::StorageKeyIterator;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("pallet {0} not found")]
    PalletNotFound(String),
    #[error("storage item {pallet}::{item} not found")]
    EntryNotFound { pallet: String, item: String },
    #[error("storage item {entry} takes {expected} keys, got {found}")]
    TooManyKeys {
        entry: String,
        expected: usize,
        found: usize,
    },
    #[error("storage item {entry} needs all of its {expected} keys, got {found}")]
    MissingKeys {
        entry: String,
        expected: usize,
        found: usize,
    },
    #[error("key does not belong to any known storage item")]
    UnknownPrefix,
    #[error("key of {0} does not start with the prefix of the item")]
    PrefixMismatch(String),
    #[error("key of {entry} ends inside of key {index}")]
    KeyTooShort { entry: String, index: usize },
    #[error("key of {entry} has {trailing} bytes after its last key")]
    TrailingKeyBytes { entry: String, trailing: usize },
    #[error("failed to encode key {index} of {entry}: {source}")]
    EncodeKey {
        entry: String,
        index: usize,
        source: CodecError,
    },
    #[error("failed to decode key {index} of {entry}: {source}")]
    DecodeKey {
        entry: String,
        index: usize,
        source: CodecError,
    },
    #[error("failed to decode value of {entry}: {source}")]
    DecodeValue { entry: String, source: CodecError },
}

fn entry_name(entry: &StorageEntryMetadata) -> String {
    format!("{}::{}", entry.pallet, entry.name)
}

/// `twox128(pallet) ++ twox128(item)`, the address of a plain storage value
/// and the common prefix of all entries of a map.
pub fn storage_prefix(pallet: &str, item: &str) -> [u8; 32] {
    let mut prefix = [0; 32];
    prefix[..16].copy_from_slice(&twox_128(pallet.as_bytes()));
    prefix[16..].copy_from_slice(&twox_128(item.as_bytes()));
    prefix
}

/// Looks up a storage item, turning misses into errors.
pub fn storage_entry<'a>(
    metadata: &'a Metadata,
    pallet: &str,
    item: &str,
) -> Result<&'a StorageEntryMetadata, StorageError> {
    let pallet_meta = metadata
        .pallet_by_name(pallet)
        .ok_or_else(|| StorageError::PalletNotFound(pallet.to_string()))?;

    pallet_meta
        .storage(item)
        .ok_or_else(|| StorageError::EntryNotFound {
            pallet: pallet.to_string(),
            item: item.to_string(),
        })
}

/// A single hashed key of a storage address.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// Output of a fixed hasher. The key cannot be recovered.
    Hash(Vec<u8>),
    /// Output of a concat hasher together with the key it embeds.
    Full(Value<TypeId>, Vec<u8>),
}

impl Component {
    /// The bytes this component contributes to the address.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Component::Hash(bytes) | Component::Full(_, bytes) => bytes,
        }
    }
    /// The decoded key, for concat hashers.
    pub fn value(&self) -> Option<&Value<TypeId>> {
        match self {
            Component::Hash(_) => None,
            Component::Full(value, _) => Some(value),
        }
    }
}

/// A complete or partial storage address.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageKey {
    pallet: String,
    item: String,
    prefix: [u8; 32],
    arity: usize,
    components: Vec<Component>,
}

impl StorageKey {
    /// Derives the address of `pallet::item` for the given keys.
    ///
    /// Fewer keys than the item declares produce a prefix shared by all
    /// entries matching the given keys. More keys are an error.
    pub fn new<C>(metadata: &Metadata, pallet: &str, item: &str, keys: &[Value<C>]) -> Result<Self, StorageError> {
        let entry = storage_entry(metadata, pallet, item)?;
        let prefix_name = metadata
            .pallet_by_name(pallet)
            .map(|p| p.storage_prefix())
            .unwrap_or(pallet);

        let mut key = StorageKey {
            pallet: entry.pallet.clone(),
            item: entry.name.clone(),
            prefix: storage_prefix(prefix_name, &entry.name),
            arity: entry.arity(),
            components: Vec::with_capacity(keys.len()),
        };
        if keys.len() > entry.arity() {
            return Err(StorageError::TooManyKeys {
                entry: entry_name(entry),
                expected: entry.arity(),
                found: keys.len(),
            });
        }

        for value in keys {
            key.push(entry, metadata.types(), value)?;
        }

        debug!(
            "Derived storage key of {} with {} of {} keys",
            entry_name(entry),
            key.components.len(),
            key.arity
        );

        Ok(key)
    }
    fn push<C>(&mut self, entry: &StorageEntryMetadata, types: &Registry, value: &Value<C>) -> Result<(), StorageError> {
        let index = self.components.len();
        let (hasher, ty) = match (entry.hashers.get(index), entry.key_types.get(index)) {
            (Some(hasher), Some(ty)) => (*hasher, *ty),
            _ => {
                return Err(StorageError::TooManyKeys {
                    entry: entry_name(entry),
                    expected: entry.arity(),
                    found: index + 1,
                })
            }
        };

        let mut encoder = Encoder::new();
        encode_value(&mut encoder, value, ty, types).map_err(|source| StorageError::EncodeKey {
            entry: entry_name(entry),
            index,
            source,
        })?;
        let encoded = encoder.into_inner();
        let hashed = hasher.hash(&encoded);

        let component = if hasher.is_concat() {
            // Decoding the encoded key yields the value in its canonical form.
            let value = Value::decode_as(ty, &encoded, types).map_err(|source| StorageError::DecodeKey {
                entry: entry_name(entry),
                index,
                source,
            })?;
            Component::Full(value, hashed)
        } else {
            Component::Hash(hashed)
        };

        self.components.push(component);
        Ok(())
    }
    /// Parses a raw address, identifying the storage item from its prefix.
    pub fn decode(metadata: &Metadata, raw: &[u8]) -> Result<Self, StorageError> {
        let prefix = raw.get(..32).ok_or(StorageError::UnknownPrefix)?;

        for pallet in metadata.pallets() {
            if prefix[..16] != twox_128(pallet.storage_prefix().as_bytes()) {
                continue;
            }

            for entry in pallet.storage_entries() {
                if prefix[16..] == twox_128(entry.name.as_bytes()) {
                    return Self::decode_entry(metadata.types(), pallet.storage_prefix(), entry, raw);
                }
            }
        }

        Err(StorageError::UnknownPrefix)
    }
    /// Parses a raw address of a known storage item. Keys after the last
    /// complete one may be missing.
    pub fn decode_entry(
        types: &Registry,
        prefix_name: &str,
        entry: &StorageEntryMetadata,
        raw: &[u8],
    ) -> Result<Self, StorageError> {
        let prefix = storage_prefix(prefix_name, &entry.name);
        let mut rest = raw
            .strip_prefix(&prefix[..])
            .ok_or_else(|| StorageError::PrefixMismatch(entry_name(entry)))?;

        let mut components = vec![];
        for (index, (hasher, ty)) in entry.hashers.iter().zip(&entry.key_types).enumerate() {
            if rest.is_empty() {
                break;
            }

            let too_short = || StorageError::KeyTooShort {
                entry: entry_name(entry),
                index,
            };
            if rest.len() < hasher.hash_len() {
                return Err(too_short());
            }

            if !hasher.is_concat() {
                let (hash, tail) = rest.split_at(hasher.hash_len());
                components.push(Component::Hash(hash.to_vec()));
                rest = tail;
                continue;
            }

            let mut decoder = Decoder::new(&rest[hasher.hash_len()..]);
            let value = decode_value(&mut decoder, *ty, types).map_err(|source| StorageError::DecodeKey {
                entry: entry_name(entry),
                index,
                source,
            })?;
            let consumed = rest.len() - decoder.remaining().len();

            components.push(Component::Full(value, rest[..consumed].to_vec()));
            rest = decoder.remaining();
        }

        if !rest.is_empty() {
            return Err(StorageError::TrailingKeyBytes {
                entry: entry_name(entry),
                trailing: rest.len(),
            });
        }

        Ok(StorageKey {
            pallet: entry.pallet.clone(),
            item: entry.name.clone(),
            prefix,
            arity: entry.arity(),
            components,
        })
    }
    pub fn pallet(&self) -> &str {
        &self.pallet
    }
    pub fn item(&self) -> &str {
        &self.item
    }
    pub fn components(&self) -> &[Component] {
        &self.components
    }
    /// Whether keys are missing, making this the prefix of several entries.
    pub fn is_partial(&self) -> bool {
        self.components.len() < self.arity
    }
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.prefix.to_vec();
        for component in &self.components {
            out.extend_from_slice(component.bytes());
        }
        out
    }
}

/// Decodes the value of a storage item as returned by `state_getStorage`.
///
/// An absent value of an item with a default decodes the default. An absent
/// value of an optional item is `None`.
pub fn decode_storage_value(
    entry: &StorageEntryMetadata,
    types: &Registry,
    raw: Option<&[u8]>,
) -> Result<Option<Value<TypeId>>, StorageError> {
    let bytes = match (raw, entry.modifier) {
        (Some(bytes), _) => bytes,
        (None, StorageEntryModifier::Default) => &entry.default,
        (None, StorageEntryModifier::Optional) => return Ok(None),
    };

    Value::decode_as(entry.value_ty, bytes, types)
        .map(Some)
        .map_err(|source| StorageError::DecodeValue {
            entry: entry_name(entry),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::testing::MetadataBuilder;
    use crate::metadata::version::portable::TypeDefPrimitive;
    use crate::metadata::StorageHasher;
    use hex_literal::hex;

    fn metadata() -> Metadata {
        let mut b = MetadataBuilder::new();
        let u32_ty = b.primitive(TypeDefPrimitive::U32);
        let u64_ty = b.primitive(TypeDefPrimitive::U64);
        let account = b.account_id();
        let info = b.composite(&["AccountInfo"], &[(Some("nonce"), u32_ty), (Some("free"), u64_ty)]);
        let era_key = b.tuple(&[u32_ty, account]);

        b.pallet("System", 0)
            .plain_storage("Events", u32_ty)
            .default_storage("Number", u32_ty, vec![7, 0, 0, 0])
            .map_storage("Account", &[StorageHasher::Blake2_128Concat], account, info);
        b.pallet("Staking", 7)
            .map_storage(
                "ErasStakers",
                &[StorageHasher::Twox64Concat, StorageHasher::Blake2_128],
                era_key,
                u64_ty,
            )
            .map_storage("Bonded", &[StorageHasher::Twox64Concat], account, account);

        Metadata::from_bytes(&b.build_v15()).unwrap()
    }

    fn alice() -> Value {
        Value::bytes([1u8; 32])
    }

    #[test]
    fn plain_key_is_the_prefix() {
        let meta = metadata();
        let key = StorageKey::new::<()>(&meta, "System", "Events", &[]).unwrap();

        assert_eq!(
            key.to_bytes(),
            hex!("26aa394eea5630e07c48ae0c9558cef780d41e5e16056765bc8461851072c9d7").to_vec()
        );
        assert!(!key.is_partial());
    }

    #[test]
    fn root_of_a_map_is_the_prefix() {
        let meta = metadata();
        let key = StorageKey::new::<()>(&meta, "System", "Account", &[]).unwrap();

        assert_eq!(
            key.to_bytes(),
            hex!("26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9").to_vec()
        );
        assert!(key.is_partial());
    }

    #[test]
    fn concat_keys_are_recovered() {
        let meta = metadata();
        let key = StorageKey::new(&meta, "System", "Account", &[alice()]).unwrap();

        let raw = key.to_bytes();
        assert_eq!(raw.len(), 32 + 16 + 32);
        assert_eq!(&raw[48..], &[1u8; 32]);

        let parsed = StorageKey::decode(&meta, &raw).unwrap();
        assert_eq!(parsed.pallet(), "System");
        assert_eq!(parsed.item(), "Account");
        assert_eq!(parsed, key);
        // The account newtype decodes as a sequence holding its bytes.
        assert_eq!(
            parsed.components()[0].value().cloned().map(Value::remove_context),
            Some(Value::sequence([alice()]))
        );
    }

    #[test]
    fn fixed_hashers_only_yield_hashes() {
        let meta = metadata();
        let key = StorageKey::new(
            &meta,
            "Staking",
            "ErasStakers",
            &[Value::u128(12), alice()],
        )
        .unwrap();

        let parsed = StorageKey::decode(&meta, &key.to_bytes()).unwrap();
        let components = parsed.components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].value().and_then(|v| v.as_u128()), Some(12));
        assert_eq!(components[1], Component::Hash(crate::metadata::hasher::blake2_128(&[1u8; 32]).to_vec()));

        // A prefix with only the era bound parses as a partial key.
        let partial = StorageKey::new(&meta, "Staking", "ErasStakers", &[Value::u128(12)]).unwrap();
        let parsed = StorageKey::decode(&meta, &partial.to_bytes()).unwrap();
        assert!(parsed.is_partial());
        assert_eq!(parsed.components().len(), 1);
    }

    #[test]
    fn too_many_keys() {
        let meta = metadata();
        let err = StorageKey::new(&meta, "System", "Account", &[alice(), alice()]).unwrap_err();

        assert_eq!(
            err,
            StorageError::TooManyKeys {
                entry: "System::Account".into(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn truncated_and_foreign_keys() {
        let meta = metadata();
        let raw = StorageKey::new(&meta, "System", "Account", &[alice()]).unwrap().to_bytes();

        assert!(matches!(
            StorageKey::decode(&meta, &raw[..40]),
            Err(StorageError::KeyTooShort { index: 0, .. })
        ));
        assert!(matches!(
            StorageKey::decode(&meta, &raw[..60]),
            Err(StorageError::DecodeKey { index: 0, .. })
        ));
        assert_eq!(
            StorageKey::decode(&meta, &storage_prefix("Foo", "Bar")),
            Err(StorageError::UnknownPrefix)
        );
    }

    #[test]
    fn values_fall_back_to_defaults() {
        let meta = metadata();
        let types = meta.types();

        let number = meta.storage("System", "Number").unwrap();
        let value = decode_storage_value(number, types, None).unwrap().unwrap();
        assert_eq!(value.as_u128(), Some(7));

        let account = meta.storage("System", "Account").unwrap();
        assert_eq!(decode_storage_value(account, types, None).unwrap(), None);

        let info = decode_storage_value(account, types, Some(&hex!("05000000")[..]));
        assert!(matches!(info, Err(StorageError::DecodeValue { .. })));

        let info = decode_storage_value(account, types, Some(&hex!("050000000100000000000000")[..]))
            .unwrap()
            .unwrap();
        assert_eq!(info.at("nonce").and_then(|v| v.as_u128()), Some(5));
        assert_eq!(info.at("free").and_then(|v| v.as_u128()), Some(1));
    }
}
