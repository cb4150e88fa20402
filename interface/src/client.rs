use crate::api::{ApiRegistry, ApiWrapper, StaticStorage, StorageApi};
use crate::common::{AccountId32, Hash, MultiAddress};
use crate::config::ChainConfig;
use crate::constants::decode_constant;
use crate::events::{decode_events, EventRecord};
use crate::extrinsic::{Extrinsic, SignedExtrinsicBuilder, EXTRINSIC_VERSION};
use crate::metadata::{Metadata, TypeId};
use crate::rpc::{RpcClient, TransactionProgress};
use crate::runtime_api::encode_runtime_api_call;
use crate::signer::Signer;
use crate::storage::{decode_storage_value, storage_entry, StorageError, StorageKey, StorageKeyIterator};
use crate::value::Value;
use crate::{Error, Result};
use log::{debug, trace};
use std::sync::Arc;

/// Versions of the runtime that are part of every signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub spec_version: u32,
    pub transaction_version: u32,
}

/// A connection to a chain.
///
/// Holds the metadata of the runtime, which all dynamic and static
/// operations are checked against, and a cache of the static APIs created
/// for it.
pub struct Client<R> {
    metadata: Arc<Metadata>,
    rpc: R,
    config: ChainConfig,
    apis: ApiRegistry,
}

impl<R: RpcClient> Client<R> {
    /// Fetches the metadata of the latest block and creates the client.
    pub async fn new(rpc: R, config: ChainConfig) -> Result<Self> {
        let raw = rpc.metadata(None).await.map_err(Error::Rpc)?;
        let metadata = Metadata::from_bytes(&raw)?;

        debug!(
            "Connected to runtime with {} pallets and {} types",
            metadata.pallets().count(),
            metadata.types().len()
        );

        Ok(Self::with_metadata(rpc, metadata, config))
    }
    pub fn with_metadata(rpc: R, metadata: Metadata, config: ChainConfig) -> Self {
        Client {
            metadata: Arc::new(metadata),
            rpc,
            config,
            apis: ApiRegistry::new(),
        }
    }
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
    pub fn shared_metadata(&self) -> Arc<Metadata> {
        Arc::clone(&self.metadata)
    }
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
    pub fn rpc(&self) -> &R {
        &self.rpc
    }
    /// The static API `A`, validated against the metadata on first use.
    pub fn api<A: ApiWrapper>(&self) -> Result<Arc<A>> {
        self.apis.get::<A>(&self.metadata)
    }
    pub async fn storage_raw(&self, key: &[u8], at: Option<Hash>) -> Result<Option<Vec<u8>>> {
        self.rpc.storage(key, at).await.map_err(Error::Rpc)
    }
    /// Fetches and decodes a storage value. Absent values of items with a
    /// default decode the default.
    pub async fn storage<C>(
        &self,
        pallet: &str,
        item: &str,
        keys: &[Value<C>],
        at: Option<Hash>,
    ) -> Result<Option<Value<TypeId>>> {
        let entry = storage_entry(&self.metadata, pallet, item)?;
        if keys.len() < entry.arity() {
            return Err(StorageError::MissingKeys {
                entry: format!("{}::{}", pallet, item),
                expected: entry.arity(),
                found: keys.len(),
            }
            .into());
        }

        let key = StorageKey::new(&self.metadata, pallet, item, keys)?;
        let raw = self.storage_raw(&key.to_bytes(), at).await?;

        Ok(decode_storage_value(entry, self.metadata.types(), raw.as_deref())?)
    }
    /// Fetches a storage value through its static description.
    pub async fn fetch<T: StaticStorage>(&self, keys: &T::Keys, at: Option<Hash>) -> Result<Option<T::Value>> {
        let api = self.api::<StorageApi<T>>()?;
        let raw = self.storage_raw(&api.key(keys), at).await?;
        api.decode(raw.as_deref())
    }
    /// All keys below the prefix of `iter`, fetched page by page.
    pub async fn storage_keys(&self, iter: &StorageKeyIterator<'_>, at: Option<Hash>) -> Result<Vec<StorageKey>> {
        let prefix = iter.prefix();
        let page_size = self.config.storage_page_size.max(1);
        let mut keys = Vec::new();
        let mut start_key: Option<Vec<u8>> = None;

        loop {
            let page = self
                .rpc
                .storage_keys_paged(&prefix, page_size, start_key.as_deref(), at)
                .await
                .map_err(Error::Rpc)?;

            trace!(
                "Fetched {} keys of {}::{}",
                page.len(),
                iter.entry().pallet,
                iter.entry().name
            );

            for raw in &page {
                keys.push(iter.decode_key(raw)?);
            }

            if page.len() < page_size as usize {
                break;
            }
            start_key = page.last().cloned();
        }

        Ok(keys)
    }
    /// Calls a runtime API through `state_call` and decodes its output.
    pub async fn runtime_api<C>(
        &self,
        api: &str,
        method: &str,
        args: &[Value<C>],
        at: Option<Hash>,
    ) -> Result<Value<TypeId>> {
        let call = encode_runtime_api_call(&self.metadata, api, method, args)?;
        let output = self
            .rpc
            .state_call(&call.function, &call.args, at)
            .await
            .map_err(Error::Rpc)?;

        call.decode_output(&self.metadata, &output)
    }
    pub fn constant(&self, pallet: &str, name: &str) -> Result<Value<TypeId>> {
        decode_constant(&self.metadata, pallet, name)
    }
    /// The events of a block, from `System.Events`.
    pub async fn events(&self, at: Option<Hash>) -> Result<Vec<EventRecord>> {
        let key = crate::storage::storage_prefix("System", "Events");
        match self.storage_raw(&key, at).await? {
            Some(raw) => decode_events(&self.metadata, &raw),
            None => Ok(vec![]),
        }
    }
    pub async fn block_number(&self, at: Option<Hash>) -> Result<u64> {
        let number = self
            .storage::<()>("System", "Number", &[], at)
            .await?
            .ok_or(Error::MissingMetadataType("System::Number"))?;

        uint(&number, "System::Number")
    }
    /// The hash of a recent block, as kept by `System.BlockHash`.
    pub async fn block_hash(&self, number: u64) -> Result<Option<Hash>> {
        let hash = match self
            .storage("System", "BlockHash", &[Value::u128(number as u128)], None)
            .await?
        {
            Some(hash) => hash,
            None => return Ok(None),
        };

        hash.as_bytes()
            .and_then(|b| b.try_into().ok())
            .map(Some)
            .ok_or(Error::UnexpectedShape {
                item: "System::BlockHash",
                expected: "a 32 byte hash",
            })
    }
    pub async fn genesis_hash(&self) -> Result<Hash> {
        self.block_hash(0)
            .await?
            .ok_or(Error::MissingMetadataType("System::BlockHash"))
    }
    /// Read from the `System.Version` constant.
    pub fn runtime_version(&self) -> Result<RuntimeVersion> {
        let version = self.constant("System", "Version")?;
        let field = |name: &'static str| {
            version
                .at(name)
                .ok_or(Error::MissingMetadataType(name))
                .and_then(|v| uint(v, name))
        };

        Ok(RuntimeVersion {
            spec_version: field("spec_version")?,
            transaction_version: field("transaction_version")?,
        })
    }
    /// The next nonce of `account`, from `System.Account`. Accounts without
    /// any state start at zero.
    pub async fn account_nonce(&self, account: &AccountId32) -> Result<u64> {
        let info = match self
            .storage("System", "Account", &[account.to_value()], None)
            .await?
        {
            Some(info) => info,
            None => return Ok(0),
        };

        let nonce = info.at("nonce").ok_or(Error::UnexpectedShape {
            item: "System::Account",
            expected: "an account info with a nonce",
        })?;
        uint(nonce, "System::Account nonce")
    }
    /// Signs `call` with the current nonce of the signer, the tip and
    /// mortality of the chain configuration.
    pub async fn create_signed(&self, call: Vec<u8>, signer: &dyn Signer) -> Result<Extrinsic> {
        if self.config.extrinsic_version != EXTRINSIC_VERSION {
            return Err(Error::UnsupportedExtrinsicVersion(self.config.extrinsic_version));
        }

        let version = self.runtime_version()?;
        let genesis_hash = self.genesis_hash().await?;
        let nonce = self.account_nonce(&signer.account_id()).await?;

        let builder = SignedExtrinsicBuilder::new(&self.metadata)
            .signer(signer)
            .call(call)
            .nonce(nonce)
            .tip(self.config.default_tip)
            .spec_version(version.spec_version)
            .transaction_version(version.transaction_version)
            .genesis_hash(genesis_hash);

        let builder = match self.config.mortality_period {
            Some(period) => {
                // The hash of the current block is not known yet.
                let number = self.block_number(None).await?.saturating_sub(1);
                let hash = self
                    .block_hash(number)
                    .await?
                    .ok_or(Error::MissingMetadataType("System::BlockHash"))?;
                builder.mortal(period, number, hash)
            }
            None => builder.immortal(),
        };

        builder.build()
    }
    /// Creates a signed `Balances.transfer_keep_alive` call.
    pub async fn create_transfer(&self, signer: &dyn Signer, dest: MultiAddress, value: u128) -> Result<Extrinsic> {
        let call = crate::calls::encode_call(
            &self.metadata,
            "Balances",
            &Value::named_variant(
                "transfer_keep_alive",
                [("dest", dest.to_value()), ("value", Value::u128(value))],
            ),
        )?;

        self.create_signed(call, signer).await
    }
    /// Submits an extrinsic, returning its hash.
    pub async fn submit(&self, extrinsic: &Extrinsic) -> Result<Hash> {
        debug!("Submitting extrinsic 0x{}", hex::encode(extrinsic.hash()));
        self.rpc
            .submit_extrinsic(extrinsic.as_bytes())
            .await
            .map_err(Error::Rpc)
    }
    /// Submits an extrinsic and follows its status until it reaches a
    /// terminal state.
    pub async fn submit_and_watch(&self, extrinsic: &Extrinsic) -> Result<TransactionProgress> {
        debug!("Submitting and watching extrinsic 0x{}", hex::encode(extrinsic.hash()));
        let stream = self
            .rpc
            .watch_extrinsic(extrinsic.as_bytes())
            .await
            .map_err(Error::Rpc)?;

        Ok(TransactionProgress::new(extrinsic.hash(), stream))
    }
}

/// Reads an unsigned integer that must fit into `T`.
fn uint<T: TryFrom<u128>>(value: &Value<TypeId>, item: &'static str) -> Result<T> {
    value
        .as_u128()
        .and_then(|v| T::try_from(v).ok())
        .ok_or(Error::UnexpectedShape {
            item,
            expected: std::any::type_name::<T>(),
        })
}

impl<R> std::fmt::Debug for Client<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pallets", &self.metadata.pallets().count())
            .field("config", &self.config)
            .field("apis", &self.apis)
            .finish()
    }
}
