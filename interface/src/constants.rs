//! Pallet constants and custom values, both stored in the metadata itself.

use crate::metadata::{Metadata, TypeId};
use crate::value::Value;
use crate::{Error, Result};

/// Decodes the value of a pallet constant.
pub fn decode_constant(metadata: &Metadata, pallet: &str, name: &str) -> Result<Value<TypeId>> {
    let pallet_meta = metadata
        .pallet_by_name(pallet)
        .ok_or_else(|| Error::PalletNotFound(pallet.to_string()))?;
    let constant = pallet_meta
        .constant(name)
        .ok_or_else(|| Error::ItemNotFound {
            kind: "constant",
            pallet: pallet.to_string(),
            name: name.to_string(),
        })?;

    Ok(Value::decode_as(constant.ty, &constant.value, metadata.types())?)
}

/// Decodes an entry of the custom metadata table. Only present in V15
/// metadata.
pub fn decode_custom_value(metadata: &Metadata, name: &str) -> Result<Option<Value<TypeId>>> {
    match metadata.custom_value(name) {
        Some(custom) => Ok(Some(Value::decode_as(custom.ty, &custom.value, metadata.types())?)),
        None => Ok(None),
    }
}
