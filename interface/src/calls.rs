//! Dynamic encoding of pallet calls.
//!
//! An encoded call is the pallet index followed by the call variant, which
//! itself is the call index followed by the call fields.

use crate::codec::{Decoder, Encoder};
use crate::metadata::{Metadata, TypeId};
use crate::value::{decode_value, encode_value, Value};
use crate::{Error, Result};
use log::debug;

/// A call decoded from its encoded form.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCall {
    pub pallet: String,
    pub pallet_index: u8,
    /// The call variant of the pallet, named after the call.
    pub call: Value<TypeId>,
}

impl DecodedCall {
    pub fn name(&self) -> &str {
        self.call.variant_name().unwrap_or_default()
    }
}

/// Encodes `call`, a variant named after the call, for `pallet`.
///
/// ```no_run
/// # let metadata: tessera::metadata::Metadata = unimplemented!();
/// use tessera::calls::encode_call;
/// use tessera::value::Value;
///
/// let call = Value::named_variant(
///     "transfer_keep_alive",
///     [
///         ("dest", Value::unnamed_variant("Id", [Value::bytes([0u8; 32])])),
///         ("value", Value::u128(1_000)),
///     ],
/// );
/// let encoded = encode_call(&metadata, "Balances", &call).unwrap();
/// ```
pub fn encode_call<C>(metadata: &Metadata, pallet: &str, call: &Value<C>) -> Result<Vec<u8>> {
    let pallet_meta = metadata
        .pallet_by_name(pallet)
        .ok_or_else(|| Error::PalletNotFound(pallet.to_string()))?;
    let calls = pallet_meta.calls().ok_or_else(|| Error::ItemNotFound {
        kind: "call",
        pallet: pallet.to_string(),
        name: call.variant_name().unwrap_or_default().to_string(),
    })?;

    let name = call.variant_name().unwrap_or_default();
    if calls.index_of(name).is_none() {
        return Err(Error::ItemNotFound {
            kind: "call",
            pallet: pallet.to_string(),
            name: name.to_string(),
        });
    }

    let mut encoder = Encoder::new();
    encoder.push_byte(pallet_meta.index());
    encode_value(&mut encoder, call, calls.ty(), metadata.types())?;

    debug!("Encoded call {}::{} ({} bytes)", pallet, name, encoder.len());
    Ok(encoder.into_inner())
}

/// Decodes a call from the whole of `bytes`.
pub fn decode_call(metadata: &Metadata, bytes: &[u8]) -> Result<DecodedCall> {
    let mut decoder = Decoder::new(bytes);
    let call = decode_call_from(metadata, &mut decoder)?;
    decoder.finish()?;
    Ok(call)
}

/// Decodes a call from the front of the decoder, as found inside of
/// extrinsics.
pub fn decode_call_from(metadata: &Metadata, decoder: &mut Decoder<'_>) -> Result<DecodedCall> {
    let pallet_index = decoder.read_byte()?;
    let pallet = metadata
        .pallet_by_index(pallet_index)
        .ok_or(Error::UnknownPalletIndex(pallet_index))?;
    let calls = pallet.calls().ok_or_else(|| Error::ItemNotFound {
        kind: "call",
        pallet: pallet.name().to_string(),
        name: String::new(),
    })?;

    Ok(DecodedCall {
        pallet: pallet.name().to_string(),
        pallet_index,
        call: decode_value(decoder, calls.ty(), metadata.types())?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::codec::CodecErrorKind;
    use crate::metadata::testing::MetadataBuilder;
    use crate::metadata::version::portable::TypeDefPrimitive;

    /// Balances at index 5 with `transfer_keep_alive` (3) and `burn` (9).
    pub(crate) fn balances() -> MetadataBuilder {
        let mut b = MetadataBuilder::new();
        let u128_ty = b.primitive(TypeDefPrimitive::U128);
        let balance = b.compact(u128_ty);
        let account = b.account_id();
        let u32_ty = b.primitive(TypeDefPrimitive::U32);
        let index = b.compact(u32_ty);
        let byte = b.primitive(TypeDefPrimitive::U8);
        let raw = b.sequence(byte);
        let bytes32 = b.array(byte, 32);
        let bytes20 = b.array(byte, 20);
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
        let calls = b.variant(
            &["pallet_balances", "pallet", "Call"],
            &[
                (
                    "transfer_keep_alive",
                    3,
                    &[(Some("dest"), address), (Some("value"), balance)],
                ),
                ("burn", 9, &[(Some("value"), balance)]),
            ],
        );
        b.pallet("Balances", 5).calls(calls);
        b
    }

    fn transfer() -> Value {
        Value::named_variant(
            "transfer_keep_alive",
            [
                ("dest", Value::unnamed_variant("Id", [Value::bytes([2u8; 32])])),
                ("value", Value::u128(100)),
            ],
        )
    }

    #[test]
    fn encode_and_decode_call() {
        let meta = Metadata::from_bytes(&balances().build_v15()).unwrap();

        let encoded = encode_call(&meta, "Balances", &transfer()).unwrap();
        let mut expected = vec![5, 3, 0];
        expected.extend_from_slice(&[2u8; 32]);
        // Compact 100.
        expected.extend_from_slice(&[0x91, 0x01]);
        assert_eq!(encoded, expected);

        let decoded = decode_call(&meta, &encoded).unwrap();
        assert_eq!(decoded.pallet, "Balances");
        assert_eq!(decoded.pallet_index, 5);
        assert_eq!(decoded.name(), "transfer_keep_alive");
        assert_eq!(decoded.call.at("value").and_then(|v| v.as_u128()), Some(100));
    }

    #[test]
    fn unknown_calls_and_pallets() {
        let meta = Metadata::from_bytes(&balances().build_v15()).unwrap();

        let call = Value::named_variant("mint", [("value", Value::u128(1))]);
        assert!(matches!(
            encode_call(&meta, "Balances", &call),
            Err(Error::ItemNotFound { kind: "call", .. })
        ));
        assert!(matches!(
            encode_call(&meta, "Staking", &transfer()),
            Err(Error::PalletNotFound(_))
        ));
        assert!(matches!(decode_call(&meta, &[6, 0]), Err(Error::UnknownPalletIndex(6))));

        match decode_call(&meta, &[5, 4]) {
            Err(Error::Codec(err)) => {
                assert!(matches!(err.kind(), CodecErrorKind::InvalidDiscriminant { byte: 4, .. }))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
