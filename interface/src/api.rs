//! Statically typed access to calls, events, storage and constants.
//!
//! The static types are validated against the metadata of the chain once, when
//! their wrapper is created. Afterwards they are encoded and decoded directly
//! with `parity-scale-codec`, without going through [`Value`](crate::value::Value).
//!
//! ```
//! use tessera::api::StaticCall;
//! use tessera::common::MultiAddress;
//! use tessera::scale::{Decode, Encode};
//! use tessera::static_type::IdentifiableType;
//!
//! #[derive(Debug, Encode, Decode, IdentifiableType)]
//! pub struct TransferKeepAlive {
//!     pub dest: MultiAddress,
//!     #[codec(compact)]
//!     pub value: u128,
//! }
//!
//! impl StaticCall for TransferKeepAlive {
//!     const PALLET: &'static str = "Balances";
//!     const CALL: &'static str = "transfer_keep_alive";
//! }
//! ```

use crate::events::DecodedEvent;
use crate::metadata::{
    Metadata, PalletMetadata, StorageEntryModifier, StorageHasher, Variant, VariantIndex,
};
use crate::static_type::{registry_of, validate, validate_fields, IdentifiableType, StaticRegistry};
use crate::storage::storage_prefix;
use crate::{Error, Result};
use log::debug;
use parity_scale_codec::{Decode, DecodeAll, Encode};
use parking_lot::Mutex;
use std::any::{Any, TypeId as AnyTypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A call of a pallet. The fields of the type are the fields of the call.
pub trait StaticCall: Encode + Decode + IdentifiableType + Send + Sync {
    const PALLET: &'static str;
    const CALL: &'static str;
}

/// An event of a pallet. The fields of the type are the fields of the event.
pub trait StaticEvent: Decode + IdentifiableType + Send + Sync {
    const PALLET: &'static str;
    const EVENT: &'static str;
}

/// A storage item of a pallet.
///
/// `Keys` is `()` for plain values, or a tuple of [`Key`]s pairing each
/// hasher with the key type it hashes.
pub trait StaticStorage: 'static {
    const PALLET: &'static str;
    const ITEM: &'static str;
    type Keys: StorageKeys;
    type Value: Decode + IdentifiableType;
}

/// A constant of a pallet.
pub trait StaticConstant: 'static {
    const PALLET: &'static str;
    const NAME: &'static str;
    type Value: Decode + IdentifiableType + Send + Sync;
}

/// Type level storage hasher.
pub trait StaticHasher: 'static {
    const HASHER: StorageHasher;
}

macro_rules! hashers {
    ($($name:ident),*) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name;

            impl StaticHasher for $name {
                const HASHER: StorageHasher = StorageHasher::$name;
            }
        )*
    };
}

hashers!(
    Blake2_128,
    Blake2_256,
    Blake2_128Concat,
    Twox128,
    Twox256,
    Twox64Concat,
    Identity
);

/// A single key of a storage map, hashed with `H`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key<H, K> {
    pub key: K,
    hasher: PhantomData<H>,
}

impl<H, K> Key<H, K> {
    pub fn new(key: K) -> Self {
        Key {
            key,
            hasher: PhantomData,
        }
    }
}

impl<H, K> From<K> for Key<H, K> {
    fn from(key: K) -> Self {
        Key::new(key)
    }
}

/// The keys of a storage item.
pub trait StorageKeys {
    fn hashers() -> Vec<StorageHasher>;
    /// Registers the key types, in key order.
    fn register(registry: &mut StaticRegistry) -> Vec<crate::metadata::TypeId>;
    /// Appends the hashed keys.
    fn hash_to(&self, out: &mut Vec<u8>);
}

impl StorageKeys for () {
    fn hashers() -> Vec<StorageHasher> {
        vec![]
    }
    fn register(_: &mut StaticRegistry) -> Vec<crate::metadata::TypeId> {
        vec![]
    }
    fn hash_to(&self, _: &mut Vec<u8>) {}
}

impl<H: StaticHasher, K: Encode + IdentifiableType> StorageKeys for Key<H, K> {
    fn hashers() -> Vec<StorageHasher> {
        vec![H::HASHER]
    }
    fn register(registry: &mut StaticRegistry) -> Vec<crate::metadata::TypeId> {
        vec![registry.register::<K>()]
    }
    fn hash_to(&self, out: &mut Vec<u8>) {
        H::HASHER.hash_to(&self.key.encode(), out)
    }
}

macro_rules! impl_storage_keys {
    ($($key:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($key: StorageKeys),+> StorageKeys for ($($key,)+) {
            fn hashers() -> Vec<StorageHasher> {
                let mut hashers = vec![];
                $(hashers.extend($key::hashers());)+
                hashers
            }
            fn register(registry: &mut StaticRegistry) -> Vec<crate::metadata::TypeId> {
                let mut ids = vec![];
                $(ids.extend($key::register(registry));)+
                ids
            }
            fn hash_to(&self, out: &mut Vec<u8>) {
                let ($($key,)+) = self;
                $($key.hash_to(out);)+
            }
        }
    };
}

impl_storage_keys!(A);
impl_storage_keys!(A, B);
impl_storage_keys!(A, B, C);
impl_storage_keys!(A, B, C, D);

/// A wrapper around a static API type, created from and validated against
/// the metadata.
pub trait ApiWrapper: Sized + Send + Sync + 'static {
    fn new(metadata: &Metadata) -> Result<Self>;
}

fn pallet_variant<'a>(
    metadata: &'a Metadata,
    kind: &'static str,
    select: fn(&PalletMetadata) -> Option<&VariantIndex>,
    pallet: &str,
    name: &str,
) -> Result<(u8, &'a Variant)> {
    let pallet_meta = metadata
        .pallet_by_name(pallet)
        .ok_or_else(|| Error::PalletNotFound(pallet.to_string()))?;
    let not_found = || Error::ItemNotFound {
        kind,
        pallet: pallet.to_string(),
        name: name.to_string(),
    };

    let index = select(pallet_meta).ok_or_else(not_found)?;
    let variant = metadata
        .variant_by_name(index.ty(), name)
        .ok_or_else(not_found)?;

    Ok((pallet_meta.index(), variant))
}

fn validate_variant<T: IdentifiableType>(metadata: &Metadata, variant: &Variant) -> Result<()> {
    let (statics, ours) = registry_of::<T>().map_err(crate::metadata::Error::from)?;
    validate_fields(&statics, ours, metadata.types(), &variant.fields)?;
    Ok(())
}

/// Encodes and decodes a [`StaticCall`].
#[derive(Debug)]
pub struct CallApi<T> {
    pallet_index: u8,
    call_index: u8,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StaticCall> ApiWrapper for CallApi<T> {
    fn new(metadata: &Metadata) -> Result<Self> {
        let (pallet_index, variant) = pallet_variant(metadata, "call", PalletMetadata::calls, T::PALLET, T::CALL)?;
        validate_variant::<T>(metadata, variant)?;

        Ok(CallApi {
            pallet_index,
            call_index: variant.index,
            _marker: PhantomData,
        })
    }
}

impl<T: StaticCall> CallApi<T> {
    /// Pallet and call index.
    pub fn index(&self) -> (u8, u8) {
        (self.pallet_index, self.call_index)
    }
    pub fn encode(&self, call: &T) -> Vec<u8> {
        let mut out = vec![self.pallet_index, self.call_index];
        call.encode_to(&mut out);
        out
    }
    /// Decodes an encoded call, returning `None` if it is a different call.
    pub fn decode(&self, bytes: &[u8]) -> Result<Option<T>> {
        match bytes {
            [pallet, call, fields @ ..] if *pallet == self.pallet_index && *call == self.call_index => {
                let mut fields = fields;
                Ok(Some(T::decode_all(&mut fields)?))
            }
            _ => Ok(None),
        }
    }
}

/// Decodes a [`StaticEvent`].
#[derive(Debug)]
pub struct EventApi<T> {
    pallet_index: u8,
    event_index: u8,
    event_ty: crate::metadata::TypeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StaticEvent> ApiWrapper for EventApi<T> {
    fn new(metadata: &Metadata) -> Result<Self> {
        let (pallet_index, variant) = pallet_variant(metadata, "event", PalletMetadata::events, T::PALLET, T::EVENT)?;
        validate_variant::<T>(metadata, variant)?;

        let event_ty = metadata
            .pallet_by_index(pallet_index)
            .and_then(|p| p.events())
            .map(|e| e.ty())
            .ok_or(Error::MissingMetadataType("pallet events"))?;

        Ok(EventApi {
            pallet_index,
            event_index: variant.index,
            event_ty,
            _marker: PhantomData,
        })
    }
}

impl<T: StaticEvent> EventApi<T> {
    /// Decodes an encoded event, returning `None` if it is a different event.
    pub fn decode(&self, bytes: &[u8]) -> Result<Option<T>> {
        match bytes {
            [pallet, event, fields @ ..] if *pallet == self.pallet_index && *event == self.event_index => {
                let mut fields = fields;
                Ok(Some(T::decode_all(&mut fields)?))
            }
            _ => Ok(None),
        }
    }
    /// Converts a dynamically decoded event, returning `None` if it is a
    /// different event.
    pub fn from_decoded(&self, metadata: &Metadata, event: &DecodedEvent) -> Result<Option<T>> {
        if event.pallet_index != self.pallet_index || event.name() != T::EVENT {
            return Ok(None);
        }

        let encoded = event.event.encode_as(self.event_ty, metadata.types())?;
        // Skip the event index.
        let mut fields = encoded.get(1..).unwrap_or_default();
        Ok(Some(T::decode_all(&mut fields)?))
    }
    /// The first matching event.
    pub fn find(&self, metadata: &Metadata, events: &[DecodedEvent]) -> Result<Option<T>> {
        for event in events {
            if let Some(found) = self.from_decoded(metadata, event)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }
}

/// Derives keys and decodes values of a [`StaticStorage`] item.
#[derive(Debug)]
pub struct StorageApi<T> {
    prefix: [u8; 32],
    // Set for items with a default value.
    default: Option<Vec<u8>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StaticStorage> ApiWrapper for StorageApi<T> {
    fn new(metadata: &Metadata) -> Result<Self> {
        let pallet = metadata
            .pallet_by_name(T::PALLET)
            .ok_or_else(|| Error::PalletNotFound(T::PALLET.to_string()))?;
        let entry = pallet.storage(T::ITEM).ok_or_else(|| Error::ItemNotFound {
            kind: "storage item",
            pallet: T::PALLET.to_string(),
            name: T::ITEM.to_string(),
        })?;

        let hashers = T::Keys::hashers();
        if hashers != entry.hashers {
            return Err(Error::HasherMismatch {
                entry: format!("{}::{}", T::PALLET, T::ITEM),
                expected: entry.hashers.clone(),
                found: hashers,
            });
        }

        let mut statics = StaticRegistry::new();
        let key_types = T::Keys::register(&mut statics);
        let value_ty = statics.register::<T::Value>();
        let statics = statics.build().map_err(crate::metadata::Error::from)?;

        for (ours, theirs) in key_types.into_iter().zip(&entry.key_types) {
            validate(&statics, ours, metadata.types(), *theirs)?;
        }
        validate(&statics, value_ty, metadata.types(), entry.value_ty)?;

        Ok(StorageApi {
            prefix: storage_prefix(pallet.storage_prefix(), T::ITEM),
            default: match entry.modifier {
                StorageEntryModifier::Default => Some(entry.default.clone()),
                StorageEntryModifier::Optional => None,
            },
            _marker: PhantomData,
        })
    }
}

impl<T: StaticStorage> StorageApi<T> {
    /// Address of the value stored under `keys`.
    pub fn key(&self, keys: &T::Keys) -> Vec<u8> {
        let mut out = self.prefix.to_vec();
        keys.hash_to(&mut out);
        out
    }
    /// Common prefix of all entries of the item.
    pub fn root(&self) -> Vec<u8> {
        self.prefix.to_vec()
    }
    /// Decodes a value as returned by the node, falling back to the default
    /// of the item if it declares one.
    pub fn decode(&self, raw: Option<&[u8]>) -> Result<Option<T::Value>> {
        let mut bytes = match (raw, &self.default) {
            (Some(bytes), _) => bytes,
            (None, Some(default)) => default.as_slice(),
            (None, None) => return Ok(None),
        };

        Ok(Some(T::Value::decode_all(&mut bytes)?))
    }
}

/// The decoded value of a [`StaticConstant`].
pub struct ConstantApi<T: StaticConstant> {
    value: T::Value,
}

impl<T: StaticConstant> ApiWrapper for ConstantApi<T> {
    fn new(metadata: &Metadata) -> Result<Self> {
        let constant = metadata
            .constant(T::PALLET, T::NAME)
            .ok_or_else(|| Error::ItemNotFound {
                kind: "constant",
                pallet: T::PALLET.to_string(),
                name: T::NAME.to_string(),
            })?;

        let (statics, ours) = registry_of::<T::Value>().map_err(crate::metadata::Error::from)?;
        validate(&statics, ours, metadata.types(), constant.ty)?;

        Ok(ConstantApi {
            value: T::Value::decode_all(&mut constant.value.as_slice())?,
        })
    }
}

impl<T: StaticConstant> ConstantApi<T> {
    pub fn get(&self) -> &T::Value {
        &self.value
    }
}

/// Creates each API wrapper once per connection.
///
/// The first request for a wrapper type validates it against the metadata.
/// Later requests return the same instance. The metadata passed in must not
/// change between requests; call [`ApiRegistry::clear`] after a runtime
/// upgrade.
#[derive(Default)]
pub struct ApiRegistry {
    apis: Mutex<HashMap<AnyTypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn get<A: ApiWrapper>(&self, metadata: &Metadata) -> Result<Arc<A>> {
        // Held across creation, so a wrapper is created at most once.
        let mut apis = self.apis.lock();

        if let Some(api) = apis.get(&AnyTypeId::of::<A>()) {
            if let Ok(api) = Arc::clone(api).downcast::<A>() {
                return Ok(api);
            }
        }

        let api = Arc::new(A::new(metadata)?);
        apis.insert(AnyTypeId::of::<A>(), api.clone());
        debug!("Created API wrapper {}", std::any::type_name::<A>());

        Ok(api)
    }
    pub fn len(&self) -> usize {
        self.apis.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn clear(&self) {
        self.apis.lock().clear()
    }
}

impl std::fmt::Debug for ApiRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRegistry")
            .field("apis", &self.len())
            .finish()
    }
}
