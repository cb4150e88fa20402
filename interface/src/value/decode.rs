use super::{Composite, Value, ValueDef, Variant};
use crate::bits::BitSequence;
use crate::codec::{CodecErrorKind, Decoder, PathSegment, Result};
use crate::metadata::{Field, Primitive, Registry, TypeDefinition, TypeId};
use crate::num::I512;

impl Value<TypeId> {
    /// Decodes the whole of `bytes` as type `ty`. Fails if any bytes are left.
    pub fn decode_as(ty: TypeId, bytes: &[u8], types: &Registry) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let value = decode_value(&mut decoder, ty, types)?;
        decoder.finish()?;
        Ok(value)
    }
}

/// Decodes a single value of type `ty` from the front of the decoder.
pub fn decode_value(decoder: &mut Decoder<'_>, ty: TypeId, types: &Registry) -> Result<Value<TypeId>> {
    decoder.descend()?;
    let res = decode_nested(decoder, ty, types);
    decoder.ascend();
    res
}

fn decode_nested(decoder: &mut Decoder<'_>, ty: TypeId, types: &Registry) -> Result<Value<TypeId>> {
    let def = types
        .resolve(ty)
        .ok_or_else(|| decoder.error(CodecErrorKind::TypeNotFound(ty)))?;

    let value = match def {
        TypeDefinition::Primitive(prim) => decode_primitive(decoder, *prim)?,
        TypeDefinition::Composite(fields) => decode_composite(decoder, fields, types)?,
        TypeDefinition::Variant(variants) => {
            let byte = decoder.read_byte()?;
            let variant = variants.iter().find(|v| v.index == byte).ok_or_else(|| {
                decoder.error(CodecErrorKind::InvalidDiscriminant {
                    byte,
                    ty: types.display_name(ty),
                })
            })?;

            decoder.enter(PathSegment::Variant(variant.name.clone()));
            let fields = decode_fields(decoder, &variant.fields, types)?;
            decoder.leave();

            ValueDef::Variant(Variant {
                name: variant.name.clone(),
                fields,
            })
        }
        TypeDefinition::Sequence(elem) => {
            let len = decoder.read_compact_len()?;
            decode_elements(decoder, *elem, len, types)?
        }
        TypeDefinition::Array { element, len } => {
            decode_elements(decoder, *element, *len as usize, types)?
        }
        TypeDefinition::Tuple(elems) => {
            let mut vals = Vec::with_capacity(elems.len());
            for (idx, elem) in elems.iter().enumerate() {
                decoder.enter(PathSegment::Index(idx));
                vals.push(decode_value(decoder, *elem, types)?);
                decoder.leave();
            }

            ValueDef::Sequence(vals)
        }
        TypeDefinition::Compact(inner) => match compact_bits(types, *inner) {
            Some(0) => ValueDef::Nil,
            Some(bits) => ValueDef::UInt(decoder.read_compact(bits)?),
            None => {
                return Err(decoder.error(CodecErrorKind::NotCompactable(
                    types.display_name(*inner),
                )))
            }
        },
        TypeDefinition::BitSequence { store, order } => {
            let store_bits = store_bits(types, *store).ok_or_else(|| {
                decoder.error(CodecErrorKind::ValueMismatch {
                    expected: "unsigned bit store".to_string(),
                    found: "non integer store",
                })
            })?;

            ValueDef::BitSequence(BitSequence::decode(decoder, store_bits, *order)?)
        }
        TypeDefinition::Void => ValueDef::Nil,
    };

    Ok(Value {
        value,
        context: ty,
    })
}

fn decode_primitive(decoder: &mut Decoder<'_>, prim: Primitive) -> Result<ValueDef<TypeId>> {
    let bits = prim.bits().unwrap_or(0) as usize;

    Ok(match prim {
        Primitive::Bool => ValueDef::Bool(decoder.read_bool()?),
        Primitive::Char => {
            let raw = decoder.read_uint(4)?.low_u32();
            let c = char::from_u32(raw).ok_or_else(|| decoder.error(CodecErrorKind::InvalidChar(raw)))?;
            ValueDef::Char(c)
        }
        Primitive::Str => ValueDef::String(decoder.read_str()?),
        p if p.is_unsigned() => ValueDef::UInt(decoder.read_uint(bits / 8)?),
        _ => {
            let bytes = decoder.read_bytes(bits / 8)?;
            let int = I512::from_le_bytes(bytes)
                .ok_or_else(|| decoder.error(CodecErrorKind::IntegerOutOfRange { bits }))?;
            ValueDef::Int(int)
        }
    })
}

fn decode_composite(
    decoder: &mut Decoder<'_>,
    fields: &[Field],
    types: &Registry,
) -> Result<ValueDef<TypeId>> {
    Ok(match decode_fields(decoder, fields, types)? {
        Composite::Named(fields) => ValueDef::Map(fields),
        Composite::Unnamed(fields) => ValueDef::Sequence(fields),
    })
}

fn decode_fields(
    decoder: &mut Decoder<'_>,
    fields: &[Field],
    types: &Registry,
) -> Result<Composite<TypeId>> {
    let named = !fields.is_empty() && fields.iter().all(|f| f.name.is_some());

    if named {
        let mut out = Vec::with_capacity(fields.len());
        for field in fields {
            let name = field.name.clone().unwrap_or_default();
            decoder.enter(PathSegment::Field(name.clone()));
            out.push((name, decode_value(decoder, field.ty, types)?));
            decoder.leave();
        }

        Ok(Composite::Named(out))
    } else {
        let mut out = Vec::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            decoder.enter(PathSegment::Index(idx));
            out.push(decode_value(decoder, field.ty, types)?);
            decoder.leave();
        }

        Ok(Composite::Unnamed(out))
    }
}

fn decode_elements(
    decoder: &mut Decoder<'_>,
    elem: TypeId,
    len: usize,
    types: &Registry,
) -> Result<ValueDef<TypeId>> {
    if is_byte(types, elem) {
        return Ok(ValueDef::Bytes(decoder.read_bytes(len)?.to_vec()));
    }

    // The length prefix is untrusted, elements take at least zero bytes.
    let mut vals = Vec::with_capacity(len.min(decoder.remaining().len()));
    for idx in 0..len {
        decoder.enter(PathSegment::Index(idx));
        vals.push(decode_value(decoder, elem, types)?);
        decoder.leave();
    }

    Ok(ValueDef::Sequence(vals))
}

pub(crate) fn is_byte(types: &Registry, ty: TypeId) -> bool {
    matches!(
        types.resolve(ty),
        Some(TypeDefinition::Primitive(Primitive::U8))
    )
}

/// Bit width of the integer inside of a compact type, looking through
/// single field wrappers. `Some(0)` for unit types.
pub(crate) fn compact_bits(types: &Registry, ty: TypeId) -> Option<usize> {
    match types.resolve(ty)? {
        TypeDefinition::Primitive(p) if p.is_unsigned() => p.bits().map(|b| b as usize),
        TypeDefinition::Composite(fields) if fields.len() == 1 => compact_bits(types, fields[0].ty),
        TypeDefinition::Tuple(elems) if elems.len() == 1 => compact_bits(types, elems[0]),
        TypeDefinition::Composite(fields) if fields.is_empty() => Some(0),
        TypeDefinition::Void => Some(0),
        _ => None,
    }
}

pub(crate) fn store_bits(types: &Registry, ty: TypeId) -> Option<usize> {
    match types.resolve(ty)? {
        TypeDefinition::Primitive(
            p @ (Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64),
        ) => p.bits().map(|b| b as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{BitOrder, TypeEntry, Variant as TypeVariant};
    use hex_literal::hex;

    fn primitive(b: &mut crate::metadata::RegistryBuilder, p: Primitive) -> TypeId {
        b.insert(TypeEntry::new(TypeDefinition::Primitive(p)))
    }

    #[test]
    fn variant_uses_declared_index() {
        let mut b = Registry::builder();
        let u32_ty = primitive(&mut b, Primitive::U32);
        let ty = b.insert(TypeEntry::new(TypeDefinition::Variant(vec![
            TypeVariant::new(0, "A", vec![]),
            TypeVariant::new(3, "B", vec![Field::unnamed(u32_ty)]),
        ])));
        let types = b.build().unwrap();

        let value = Value::decode_as(ty, &hex!("0307000000"), &types).unwrap();
        assert_eq!(
            value.remove_context(),
            Value::unnamed_variant("B", [Value::u128(7)])
        );

        let err = Value::decode_as(ty, &hex!("0107000000"), &types).unwrap_err();
        assert!(matches!(
            err.kind(),
            CodecErrorKind::InvalidDiscriminant { byte: 1, .. }
        ));
    }

    #[test]
    fn named_composite_becomes_map() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let bool_ty = primitive(&mut b, Primitive::Bool);
        let ty = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![
            Field::named("b", bool_ty),
            Field::named("a", u8_ty),
        ])));
        let types = b.build().unwrap();

        let value = Value::decode_as(ty, &[1, 9], &types).unwrap();
        match &value.value {
            ValueDef::Map(fields) => {
                let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["b", "a"]);
            }
            other => panic!("unexpected value: {:?}", other),
        }
        assert_eq!(value.context, ty);
        assert_eq!(value.at("a").map(|v| v.context), Some(u8_ty));
    }

    #[test]
    fn byte_sequences_become_bytes() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let seq = b.insert(TypeEntry::new(TypeDefinition::Sequence(u8_ty)));
        let arr = b.insert(TypeEntry::new(TypeDefinition::Array {
            element: u8_ty,
            len: 2,
        }));
        let types = b.build().unwrap();

        let value = Value::decode_as(seq, &hex!("0c010203"), &types).unwrap();
        assert_eq!(value.value, ValueDef::Bytes(vec![1, 2, 3]));

        let value = Value::decode_as(arr, &hex!("0102"), &types).unwrap();
        assert_eq!(value.value, ValueDef::Bytes(vec![1, 2]));
    }

    #[test]
    fn signed_integers_are_sign_extended() {
        let mut b = Registry::builder();
        let i16_ty = primitive(&mut b, Primitive::I16);
        let types = b.build().unwrap();

        let value = Value::decode_as(i16_ty, &hex!("feff"), &types).unwrap();
        assert_eq!(value.as_i128(), Some(-2));
    }

    #[test]
    fn compact_looks_through_wrappers() {
        let mut b = Registry::builder();
        let u64_ty = primitive(&mut b, Primitive::U64);
        let wrapper = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![Field::unnamed(
            u64_ty,
        )])));
        let compact = b.insert(TypeEntry::new(TypeDefinition::Compact(wrapper)));
        let types = b.build().unwrap();

        let value = Value::decode_as(compact, &hex!("0101"), &types).unwrap();
        assert_eq!(value.as_u128(), Some(64));
    }

    #[test]
    fn errors_point_into_the_value() {
        let mut b = Registry::builder();
        let bool_ty = primitive(&mut b, Primitive::Bool);
        let seq = b.insert(TypeEntry::new(TypeDefinition::Sequence(bool_ty)));
        let ty = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![Field::named(
            "flags", seq,
        )])));
        let types = b.build().unwrap();

        let err = Value::decode_as(ty, &hex!("0c000102"), &types).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::InvalidBool(2));
        assert_eq!(err.path().to_string(), ".flags[2]");

        let err = Value::decode_as(ty, &hex!("0c00"), &types).unwrap_err();
        assert_eq!(err.path().to_string(), ".flags[1]");
    }

    #[test]
    fn bit_sequences() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let bits = b.insert(TypeEntry::new(TypeDefinition::BitSequence {
            store: u8_ty,
            order: BitOrder::Lsb0,
        }));
        let types = b.build().unwrap();

        let value = Value::decode_as(bits, &hex!("0c05"), &types).unwrap();
        let expected: BitSequence = vec![true, false, true].into();
        assert_eq!(value.value, ValueDef::BitSequence(expected));
    }

    #[test]
    fn trailing_bytes_fail() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let types = b.build().unwrap();

        let err = Value::decode_as(u8_ty, &[1, 2], &types).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::TrailingBytes(1));
    }

    fn linked_list() -> (Registry, TypeId) {
        let mut b = Registry::builder();
        let list = b.reserve();
        b.define(
            list,
            TypeEntry::new(TypeDefinition::Variant(vec![
                TypeVariant::new(0, "None", vec![]),
                TypeVariant::new(1, "Some", vec![Field::unnamed(list)]),
            ])),
        )
        .unwrap();

        (b.build().unwrap(), list)
    }

    #[test]
    fn nesting_is_bounded() {
        let (types, list) = linked_list();

        let mut shallow = vec![1; 100];
        shallow.push(0);
        let value = Value::decode_as(list, &shallow, &types).unwrap();
        assert_eq!(value.encode_as(list, &types).unwrap(), shallow);

        let mut deep = vec![1; 200_000];
        deep.push(0);
        let err = Value::decode_as(list, &deep, &types).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::TooDeep { limit: crate::codec::MAX_DEPTH });
    }
}
