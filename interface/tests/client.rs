use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parity_scale_codec::{Decode, Encode};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tessera::api::{Blake2_128Concat, CallApi, Key, StaticCall, StaticStorage, Twox64Concat};
use tessera::common::{AccountId32, Hash, MultiAddress};
use tessera::config::ChainConfig;
use tessera::extrinsic::decode_extrinsic;
use tessera::metadata::testing::MetadataBuilder;
use tessera::metadata::version::portable::TypeDefPrimitive;
use tessera::metadata::{Metadata, StorageHasher};
use tessera::rpc::{RpcClient, RpcError, StatusStream, TransactionStatus};
use tessera::signer::{SignatureAlgorithm, Signer};
use tessera::static_type::IdentifiableType;
use tessera::storage::{StorageKey, StorageKeyIterator};
use tessera::value::Value;
use tessera::{Client, Error};

#[derive(Default)]
struct Node {
    metadata: Vec<u8>,
    storage: BTreeMap<Vec<u8>, Vec<u8>>,
    submitted: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl RpcClient for Node {
    async fn metadata(&self, _: Option<Hash>) -> Result<Vec<u8>, RpcError> {
        Ok(self.metadata.clone())
    }
    async fn storage(&self, key: &[u8], _: Option<Hash>) -> Result<Option<Vec<u8>>, RpcError> {
        Ok(self.storage.get(key).cloned())
    }
    async fn storage_keys_paged(
        &self,
        prefix: &[u8],
        count: u32,
        start_key: Option<&[u8]>,
        _: Option<Hash>,
    ) -> Result<Vec<Vec<u8>>, RpcError> {
        Ok(self
            .storage
            .keys()
            .filter(|k| k.starts_with(prefix) && start_key.map_or(true, |s| k.as_slice() > s))
            .take(count as usize)
            .cloned()
            .collect())
    }
    async fn state_call(&self, function: &str, _: &[u8], _: Option<Hash>) -> Result<Vec<u8>, RpcError> {
        Err(format!("{} is not available", function).into())
    }
    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> Result<Hash, RpcError> {
        self.submitted.lock().unwrap().push(extrinsic.to_vec());
        Ok(tessera::blake2b(extrinsic))
    }
    async fn watch_extrinsic(&self, extrinsic: &[u8]) -> Result<StatusStream, RpcError> {
        self.submitted.lock().unwrap().push(extrinsic.to_vec());
        Ok(stream::iter(vec![
            Ok(TransactionStatus::Ready),
            Ok(TransactionStatus::Broadcast(vec!["peer".to_string()])),
            Ok(TransactionStatus::InBlock([9; 32])),
        ])
        .boxed())
    }
}

struct FixedSigner;

impl Signer for FixedSigner {
    fn account_id(&self) -> AccountId32 {
        AccountId32([1; 32])
    }
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }
    fn sign(&self, _: &[u8]) -> tessera::Result<Vec<u8>> {
        Ok(vec![0xee; 64])
    }
}

#[derive(Debug, PartialEq, Encode, Decode, IdentifiableType)]
struct Bond {
    controller: MultiAddress,
    #[codec(compact)]
    value: u128,
}

impl StaticCall for Bond {
    const PALLET: &'static str = "Staking";
    const CALL: &'static str = "bond";
}

struct CurrentEra;

impl StaticStorage for CurrentEra {
    const PALLET: &'static str = "Staking";
    const ITEM: &'static str = "CurrentEra";
    type Keys = ();
    type Value = u32;
}

struct ErasStakers;

impl StaticStorage for ErasStakers {
    const PALLET: &'static str = "Staking";
    const ITEM: &'static str = "ErasStakers";
    type Keys = (Key<Twox64Concat, u32>, Key<Blake2_128Concat, AccountId32>);
    type Value = u64;
}

fn node() -> Node {
    let mut b = MetadataBuilder::new();
    let u8_ty = b.primitive(TypeDefPrimitive::U8);
    let u32_ty = b.primitive(TypeDefPrimitive::U32);
    let u64_ty = b.primitive(TypeDefPrimitive::U64);
    let u128_ty = b.primitive(TypeDefPrimitive::U128);
    let unit = b.tuple(&[]);
    let hash = b.array(u8_ty, 32);
    let account = b.account_id();
    let bytes32 = b.array(u8_ty, 32);
    let bytes20 = b.array(u8_ty, 20);
    let raw = b.sequence(u8_ty);
    let index = b.compact(u32_ty);
    let address = b.variant(
        &["sp_runtime", "multiaddress", "MultiAddress"],
        &[
            ("Id", 0, &[(None, account)]),
            ("Index", 1, &[(None, index)]),
            ("Raw", 2, &[(None, raw)]),
            ("Address32", 3, &[(None, bytes32)]),
            ("Address20", 4, &[(None, bytes20)]),
        ],
    );
    let balance = b.compact(u128_ty);
    let calls = b.variant(
        &["pallet_staking", "pallet", "Call"],
        &[("bond", 0, &[(Some("controller"), address), (Some("value"), balance)])],
    );
    let version = b.composite(
        &["sp_version", "RuntimeVersion"],
        &[(Some("spec_version"), u32_ty), (Some("transaction_version"), u32_ty)],
    );
    let nonce = b.compact(u64_ty);
    let check_nonce = b.composite(&["CheckNonce"], &[(None, nonce)]);
    let stakers_key = b.tuple(&[u32_ty, account]);
    let info = b.composite(&["frame_system", "AccountInfo"], &[(Some("nonce"), u32_ty)]);

    b.signed_extension("CheckSpecVersion", unit, u32_ty);
    b.signed_extension("CheckGenesis", unit, hash);
    b.signed_extension("CheckNonce", check_nonce, unit);
    b.pallet("System", 0)
        .default_storage("Number", u32_ty, vec![0; 4])
        .map_storage("BlockHash", &[StorageHasher::Twox64Concat], u32_ty, hash)
        .map_storage("Account", &[StorageHasher::Blake2_128Concat], account, info)
        .constant("Version", version, (100u32, 2u32).encode());
    b.pallet("Staking", 7)
        .calls(calls)
        .default_storage("CurrentEra", u32_ty, vec![3, 0, 0, 0])
        .map_storage(
            "ErasStakers",
            &[StorageHasher::Twox64Concat, StorageHasher::Blake2_128Concat],
            stakers_key,
            u64_ty,
        );

    let metadata = b.build_v15();
    let parsed = Metadata::from_bytes(&metadata).unwrap();

    let mut storage = BTreeMap::new();
    let mut put = |pallet: &str, item: &str, keys: &[Value], value: Vec<u8>| {
        let key = StorageKey::new(&parsed, pallet, item, keys).unwrap();
        storage.insert(key.to_bytes(), value);
    };
    put("System", "Number", &[], 10u32.encode());
    put("System", "BlockHash", &[Value::u128(0)], vec![0xaa; 32]);
    put("System", "BlockHash", &[Value::u128(9)], vec![0xbb; 32]);
    for (era, account, stake) in [(3, [1u8; 32], 500u64), (3, [2; 32], 700), (4, [1; 32], 900)] {
        put(
            "Staking",
            "ErasStakers",
            &[Value::u128(era), AccountId32(account).to_value()],
            stake.encode(),
        );
    }

    Node {
        metadata,
        storage,
        ..Default::default()
    }
}

#[tokio::test]
async fn static_storage_through_the_client() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = Client::new(node(), ChainConfig::default()).await.unwrap();

    let era = client.fetch::<CurrentEra>(&(), None).await.unwrap();
    assert_eq!(era, Some(3));

    let stake = client
        .fetch::<ErasStakers>(&(Key::new(3), Key::new(AccountId32([2; 32]))), None)
        .await
        .unwrap();
    assert_eq!(stake, Some(700));

    let stake = client
        .fetch::<ErasStakers>(&(Key::new(5), Key::new(AccountId32([2; 32]))), None)
        .await
        .unwrap();
    assert_eq!(stake, None);

    let iter = StorageKeyIterator::new(client.metadata(), "Staking", "ErasStakers")
        .unwrap()
        .narrow(&Value::u128(3))
        .unwrap();
    let keys = client.storage_keys(&iter, None).await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys
        .iter()
        .all(|k| k.components()[0].value().and_then(|v| v.as_u128()) == Some(3)));
}

#[tokio::test]
async fn submit_static_call() {
    let _ = env_logger::builder().is_test(true).try_init();
    let client = Client::new(node(), ChainConfig::default()).await.unwrap();

    let bond = client.api::<CallApi<Bond>>().unwrap();
    let call = bond.encode(&Bond {
        controller: MultiAddress::Id(AccountId32([1; 32])),
        value: 1_000,
    });
    assert_eq!(bond.index(), (7, 0));

    let extrinsic = client.create_signed(call, &FixedSigner).await.unwrap();
    let decoded = decode_extrinsic(client.metadata(), extrinsic.as_bytes()).unwrap();
    let signature = decoded.signature.unwrap();
    assert_eq!(signature.signature.variant_name(), Some("Ed25519"));
    assert_eq!(signature.extra.len(), 3);
    assert_eq!(decoded.call.name(), "bond");

    let block = client
        .submit_and_watch(&extrinsic)
        .await
        .unwrap()
        .wait_for_in_block()
        .await
        .unwrap();
    assert_eq!(block, [9; 32]);
    assert_eq!(client.rpc().submitted.lock().unwrap().len(), 1);

    // A runtime without `Balances`.
    let res = client
        .create_transfer(&FixedSigner, MultiAddress::Id(AccountId32([2; 32])), 1)
        .await;
    assert!(matches!(res, Err(Error::PalletNotFound(pallet)) if pallet == "Balances"));
}
