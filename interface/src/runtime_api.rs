//! Calls into runtime APIs through `state_call`.

use crate::codec::Encoder;
use crate::metadata::{Metadata, RuntimeApiMethod, TypeId};
use crate::value::{encode_value, Value};
use crate::{Error, Result};
use log::debug;

/// An encoded runtime API call, ready to be passed to `state_call`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeApiCall {
    /// Entry point, e.g. `AccountNonceApi_account_nonce`.
    pub function: String,
    pub args: Vec<u8>,
    /// Type of the returned value.
    pub output: TypeId,
}

impl RuntimeApiCall {
    /// Decodes the bytes returned by the node.
    pub fn decode_output(&self, metadata: &Metadata, bytes: &[u8]) -> Result<Value<TypeId>> {
        Ok(Value::decode_as(self.output, bytes, metadata.types())?)
    }
}

/// Looks up a runtime API method, turning misses into errors.
pub fn runtime_api_method<'a>(metadata: &'a Metadata, api: &str, method: &str) -> Result<&'a RuntimeApiMethod> {
    metadata
        .runtime_api_method(api, method)
        .ok_or_else(|| Error::RuntimeApiNotFound {
            api: api.to_string(),
            method: method.to_string(),
        })
}

/// Encodes the arguments of a runtime API method, in declaration order.
pub fn encode_runtime_api_call<C>(
    metadata: &Metadata,
    api: &str,
    method: &str,
    args: &[Value<C>],
) -> Result<RuntimeApiCall> {
    let method = runtime_api_method(metadata, api, method)?;
    let function = method.state_call_name();

    if method.inputs.len() != args.len() {
        return Err(Error::RuntimeApiArity(function, method.inputs.len(), args.len()));
    }

    let mut encoder = Encoder::new();
    for ((_, ty), arg) in method.inputs.iter().zip(args) {
        encode_value(&mut encoder, arg, *ty, metadata.types())?;
    }

    debug!("Encoded runtime API call {} ({} bytes)", function, encoder.len());

    Ok(RuntimeApiCall {
        function,
        args: encoder.into_inner(),
        output: method.output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::testing::MetadataBuilder;
    use crate::metadata::version::portable::TypeDefPrimitive;

    fn metadata() -> Metadata {
        let mut b = MetadataBuilder::new();
        let u32_ty = b.primitive(TypeDefPrimitive::U32);
        let account = b.account_id();
        let string = b.primitive(TypeDefPrimitive::Str);
        let version = b.composite(
            &["sp_version", "RuntimeVersion"],
            &[(Some("spec_name"), string), (Some("spec_version"), u32_ty)],
        );
        b.runtime_api("AccountNonceApi", "account_nonce", &[("account", account)], u32_ty);
        b.runtime_api("Core", "version", &[], version);

        Metadata::from_bytes(&b.build_v15()).unwrap()
    }

    #[test]
    fn encode_args_and_decode_output() {
        let meta = metadata();

        let call = encode_runtime_api_call(&meta, "AccountNonceApi", "account_nonce", &[Value::bytes([4u8; 32])])
            .unwrap();
        assert_eq!(call.function, "AccountNonceApi_account_nonce");
        assert_eq!(call.args, vec![4u8; 32]);
        assert_eq!(call.decode_output(&meta, &[3, 0, 0, 0]).unwrap().as_u128(), Some(3));

        let call = encode_runtime_api_call::<()>(&meta, "Core", "version", &[]).unwrap();
        assert!(call.args.is_empty());
        let output = call
            .decode_output(&meta, &[0x1c, b'p', b'o', b'l', b'k', b'a', b'd', b'o', 0x10, 0x27, 0, 0])
            .unwrap();
        assert_eq!(output.at("spec_name").and_then(|v| v.as_str()), Some("polkado"));
        assert_eq!(output.at("spec_version").and_then(|v| v.as_u128()), Some(10_000));
    }

    #[test]
    fn unknown_methods_and_wrong_arity() {
        let meta = metadata();

        assert!(matches!(
            encode_runtime_api_call::<()>(&meta, "Core", "execute_block", &[]),
            Err(Error::RuntimeApiNotFound { .. })
        ));
        assert!(matches!(
            encode_runtime_api_call::<()>(&meta, "AccountNonceApi", "account_nonce", &[]),
            Err(Error::RuntimeApiArity(_, 1, 0))
        ));
    }
}
