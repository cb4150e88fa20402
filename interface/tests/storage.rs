use hex_literal::hex;
use tessera::metadata::testing::MetadataBuilder;
use tessera::metadata::version::portable::TypeDefPrimitive;
use tessera::metadata::{Metadata, StorageHasher};
use tessera::storage::{storage_prefix, StorageError, StorageKey, StorageKeyIterator};
use tessera::value::Value;

fn metadata() -> Metadata {
    let mut b = MetadataBuilder::new();
    let u32_ty = b.primitive(TypeDefPrimitive::U32);
    let u64_ty = b.primitive(TypeDefPrimitive::U64);
    let u128_ty = b.primitive(TypeDefPrimitive::U128);
    let account = b.account_id();
    let key = b.tuple(&[u32_ty, u64_ty]);

    b.pallet("System", 0)
        .plain_storage("Events", u32_ty)
        .map_storage("Account", &[StorageHasher::Blake2_128Concat], account, u128_ty);
    b.pallet("Assets", 3).map_storage(
        "Approvals",
        &[StorageHasher::Twox64Concat, StorageHasher::Blake2_128Concat],
        key,
        u128_ty,
    );

    Metadata::from_bytes(&b.build_v14()).unwrap()
}

#[test]
fn plain_value_address() {
    let meta = metadata();
    let key = StorageKey::new::<()>(&meta, "System", "Events", &[]).unwrap();

    assert_eq!(
        key.to_bytes(),
        hex!("26aa394eea5630e07c48ae0c9558cef780d41e5e16056765bc8461851072c9d7")
    );
    assert_eq!(key.to_bytes(), storage_prefix("System", "Events"));
}

#[test]
fn concat_keys_are_recoverable() {
    let meta = metadata();
    let keys = [Value::u128(7), Value::u128(9)];
    let key = StorageKey::new(&meta, "Assets", "Approvals", &keys).unwrap();
    let bytes = key.to_bytes();

    // Prefix, 8 byte hash and the key, 16 byte hash and the key.
    assert_eq!(bytes.len(), 32 + 8 + 4 + 16 + 8);

    let decoded = StorageKey::decode(&meta, &bytes).unwrap();
    assert_eq!(decoded.pallet(), "Assets");
    assert_eq!(decoded.item(), "Approvals");
    let values: Vec<_> = decoded
        .components()
        .iter()
        .map(|c| c.value().and_then(|v| v.as_u128()))
        .collect();
    assert_eq!(values, vec![Some(7), Some(9)]);
}

#[test]
fn partial_keys_prefix_full_keys() {
    let meta = metadata();
    let full = StorageKey::new(&meta, "Assets", "Approvals", &[Value::u128(7), Value::u128(9)]).unwrap();
    let partial = StorageKey::new(&meta, "Assets", "Approvals", &[Value::u128(7)]).unwrap();

    assert!(partial.is_partial());
    assert!(!full.is_partial());
    assert!(full.to_bytes().starts_with(&partial.to_bytes()));

    let iter = StorageKeyIterator::new(&meta, "Assets", "Approvals").unwrap();
    assert!(partial.to_bytes().starts_with(&iter.prefix()));
    assert_eq!(iter.remaining(), 2);

    let narrowed = iter.narrow(&Value::u128(7)).unwrap();
    assert_eq!(narrowed.prefix(), partial.to_bytes());
    assert_eq!(narrowed.remaining(), 1);

    let decoded = narrowed.decode_key(&full.to_bytes()).unwrap();
    assert_eq!(decoded, StorageKey::decode(&meta, &full.to_bytes()).unwrap());

    let other = StorageKey::new(&meta, "Assets", "Approvals", &[Value::u128(8), Value::u128(9)]).unwrap();
    assert!(matches!(
        narrowed.decode_key(&other.to_bytes()),
        Err(StorageError::PrefixMismatch(_))
    ));
}

#[test]
fn too_many_keys() {
    let meta = metadata();
    let res = StorageKey::new(&meta, "System", "Account", &[Value::bytes([0u8; 32]), Value::u128(1)]);

    assert!(matches!(
        res,
        Err(StorageError::TooManyKeys {
            expected: 1,
            found: 2,
            ..
        })
    ));
}
