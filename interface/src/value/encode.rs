use super::decode::{compact_bits, is_byte, store_bits};
use super::{Composite, Value, ValueDef};
use crate::bits::BitSequence;
use crate::codec::{CodecErrorKind, Encoder, PathSegment, Result};
use crate::metadata::{Primitive, Registry, TypeDefinition, TypeId};
use crate::num::{I512, U512};

impl<C> Value<C> {
    /// Encodes the value as type `ty`.
    pub fn encode_as(&self, ty: TypeId, types: &Registry) -> Result<Vec<u8>> {
        let mut encoder = Encoder::new();
        encode_value(&mut encoder, self, ty, types)?;
        Ok(encoder.into_inner())
    }
}

// A field or tuple element to be filled by a value.
struct Slot<'a> {
    name: Option<&'a str>,
    ty: TypeId,
}

fn mismatch<C>(encoder: &Encoder, types: &Registry, ty: TypeId, value: &Value<C>) -> crate::codec::CodecError {
    encoder.error(CodecErrorKind::ValueMismatch {
        expected: types.display_name(ty),
        found: value.kind(),
    })
}

/// Encodes `value` as type `ty`, appending to the encoder.
pub fn encode_value<C>(encoder: &mut Encoder, value: &Value<C>, ty: TypeId, types: &Registry) -> Result<()> {
    encoder.descend()?;
    let res = encode_nested(encoder, value, ty, types);
    encoder.ascend();
    res
}

fn encode_nested<C>(encoder: &mut Encoder, value: &Value<C>, ty: TypeId, types: &Registry) -> Result<()> {
    let def = types
        .resolve(ty)
        .ok_or_else(|| encoder.error(CodecErrorKind::TypeNotFound(ty)))?;

    match def {
        TypeDefinition::Primitive(prim) => encode_primitive(encoder, value, *prim, ty, types),
        TypeDefinition::Composite(fields) => {
            let slots: Vec<Slot> = fields
                .iter()
                .map(|f| Slot {
                    name: f.name.as_deref(),
                    ty: f.ty,
                })
                .collect();

            encode_product(encoder, value, &slots, ty, types)
        }
        TypeDefinition::Tuple(elems) => {
            let slots: Vec<Slot> = elems.iter().map(|ty| Slot { name: None, ty: *ty }).collect();
            encode_product(encoder, value, &slots, ty, types)
        }
        TypeDefinition::Variant(variants) => {
            let var = match &value.value {
                ValueDef::Variant(var) => var,
                _ => return Err(mismatch(encoder, types, ty, value)),
            };
            let arm = variants
                .iter()
                .find(|v| v.name == var.name)
                .ok_or_else(|| encoder.error(CodecErrorKind::UnknownVariant(var.name.clone())))?;

            encoder.push_byte(arm.index);
            encoder.enter(PathSegment::Variant(arm.name.clone()));

            let slots: Vec<Slot> = arm
                .fields
                .iter()
                .map(|f| Slot {
                    name: f.name.as_deref(),
                    ty: f.ty,
                })
                .collect();
            match &var.fields {
                Composite::Named(fields) => encode_named(encoder, fields, &slots, types)?,
                Composite::Unnamed(fields) => {
                    encode_positional(encoder, fields.iter(), fields.len(), &slots, types)?
                }
            }

            encoder.leave();
            Ok(())
        }
        TypeDefinition::Sequence(elem) => match &value.value {
            ValueDef::Bytes(bytes) if is_byte(types, *elem) => {
                encoder.write_compact_len(bytes.len());
                encoder.push_bytes(bytes);
                Ok(())
            }
            ValueDef::Sequence(vals) => {
                encoder.write_compact_len(vals.len());
                encode_elements(encoder, vals, *elem, types)
            }
            _ => Err(mismatch(encoder, types, ty, value)),
        },
        TypeDefinition::Array { element, len } => {
            let len = *len as usize;
            match &value.value {
                ValueDef::Bytes(bytes) if is_byte(types, *element) => {
                    if bytes.len() != len {
                        return Err(encoder.error(CodecErrorKind::LengthMismatch {
                            expected: len,
                            found: bytes.len(),
                        }));
                    }

                    encoder.push_bytes(bytes);
                    Ok(())
                }
                ValueDef::Sequence(vals) => {
                    if vals.len() != len {
                        return Err(encoder.error(CodecErrorKind::LengthMismatch {
                            expected: len,
                            found: vals.len(),
                        }));
                    }

                    encode_elements(encoder, vals, *element, types)
                }
                _ => Err(mismatch(encoder, types, ty, value)),
            }
        }
        TypeDefinition::Compact(inner) => {
            let bits = compact_bits(types, *inner).ok_or_else(|| {
                encoder.error(CodecErrorKind::NotCompactable(types.display_name(*inner)))
            })?;

            if bits == 0 {
                return match is_empty(value) {
                    true => Ok(()),
                    false => Err(mismatch(encoder, types, ty, value)),
                };
            }

            let int = compact_integer(value).ok_or_else(|| mismatch(encoder, types, ty, value))?;
            if int.bits() > bits {
                return Err(encoder.error(CodecErrorKind::IntegerOutOfRange { bits }));
            }

            encoder.write_compact(&int);
            Ok(())
        }
        TypeDefinition::BitSequence { store, order } => {
            let store_bits = store_bits(types, *store).ok_or_else(|| {
                encoder.error(CodecErrorKind::ValueMismatch {
                    expected: "unsigned bit store".to_string(),
                    found: "non integer store",
                })
            })?;

            match &value.value {
                ValueDef::BitSequence(bits) => bits.encode(encoder, store_bits, *order),
                ValueDef::Sequence(vals) => {
                    let bits = vals
                        .iter()
                        .map(|v| v.as_bool())
                        .collect::<Option<BitSequence>>()
                        .ok_or_else(|| mismatch(encoder, types, ty, value))?;

                    bits.encode(encoder, store_bits, *order)
                }
                _ => Err(mismatch(encoder, types, ty, value)),
            }
        }
        TypeDefinition::Void => match is_empty(value) {
            true => Ok(()),
            false => Err(mismatch(encoder, types, ty, value)),
        },
    }
}

fn is_empty<C>(value: &Value<C>) -> bool {
    match &value.value {
        ValueDef::Nil => true,
        ValueDef::Sequence(vals) => vals.is_empty(),
        ValueDef::Map(fields) => fields.is_empty(),
        _ => false,
    }
}

// The integer held by a value, looking through single field wrappers.
fn compact_integer<C>(value: &Value<C>) -> Option<U512> {
    match &value.value {
        ValueDef::UInt(v) => Some(*v),
        ValueDef::Int(v) if !v.is_negative() => Some(v.magnitude()),
        ValueDef::Sequence(vals) if vals.len() == 1 => compact_integer(&vals[0]),
        ValueDef::Map(fields) if fields.len() == 1 => compact_integer(&fields[0].1),
        _ => None,
    }
}

fn encode_primitive<C>(
    encoder: &mut Encoder,
    value: &Value<C>,
    prim: Primitive,
    ty: TypeId,
    types: &Registry,
) -> Result<()> {
    let width = prim.bits().unwrap_or(0) as usize / 8;

    match (prim, &value.value) {
        (Primitive::Bool, ValueDef::Bool(b)) => encoder.push_byte(*b as u8),
        (Primitive::Char, ValueDef::Char(c)) => encoder.push_bytes(&(*c as u32).to_le_bytes()),
        (Primitive::Str, ValueDef::String(s)) => encoder.write_str(s),
        (p, ValueDef::UInt(v)) if p.is_unsigned() => encoder.write_uint(v, width)?,
        (p, ValueDef::Int(v)) if p.is_unsigned() => {
            if v.is_negative() {
                return Err(encoder.error(CodecErrorKind::IntegerOutOfRange { bits: width * 8 }));
            }
            encoder.write_uint(&v.magnitude(), width)?
        }
        (p, ValueDef::Int(v)) if p.is_signed() => encode_signed(encoder, v, width)?,
        (p, ValueDef::UInt(v)) if p.is_signed() => {
            let v = I512::from_sign_magnitude(false, *v).ok_or_else(|| {
                encoder.error(CodecErrorKind::IntegerOutOfRange { bits: width * 8 })
            })?;
            encode_signed(encoder, &v, width)?
        }
        _ => return Err(mismatch(encoder, types, ty, value)),
    }

    Ok(())
}

fn encode_signed(encoder: &mut Encoder, value: &I512, width: usize) -> Result<()> {
    let bytes = value
        .to_le_bytes(width)
        .ok_or_else(|| encoder.error(CodecErrorKind::IntegerOutOfRange { bits: width * 8 }))?;

    encoder.push_bytes(&bytes);
    Ok(())
}

fn encode_elements<C>(encoder: &mut Encoder, vals: &[Value<C>], elem: TypeId, types: &Registry) -> Result<()> {
    for (idx, val) in vals.iter().enumerate() {
        encoder.enter(PathSegment::Index(idx));
        encode_value(encoder, val, elem, types)?;
        encoder.leave();
    }

    Ok(())
}

/// Composites and tuples. A product with a single slot is transparent: the
/// value of its only field is accepted in place of the wrapper.
fn encode_product<C>(
    encoder: &mut Encoder,
    value: &Value<C>,
    slots: &[Slot],
    ty: TypeId,
    types: &Registry,
) -> Result<()> {
    let mark = encoder.mark();
    let shaped = match &value.value {
        ValueDef::Map(fields) => Some(encode_named(encoder, fields, slots, types)),
        ValueDef::Sequence(vals) => Some(encode_positional(encoder, vals.iter(), vals.len(), slots, types)),
        ValueDef::Nil if slots.is_empty() => Some(Ok(())),
        _ => None,
    };

    if slots.len() != 1 {
        return shaped.unwrap_or_else(|| Err(mismatch(encoder, types, ty, value)));
    }

    match shaped {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => {
            encoder.rewind(mark);
            encode_value(encoder, value, slots[0].ty, types).map_err(|_| err)
        }
        None => encode_value(encoder, value, slots[0].ty, types),
    }
}

fn encode_named<C>(
    encoder: &mut Encoder,
    fields: &[(String, Value<C>)],
    slots: &[Slot],
    types: &Registry,
) -> Result<()> {
    let named = !slots.is_empty() && slots.iter().all(|s| s.name.is_some());
    if !named {
        return encode_positional(encoder, fields.iter().map(|(_, v)| v), fields.len(), slots, types);
    }

    if fields.len() != slots.len() {
        return Err(encoder.error(CodecErrorKind::LengthMismatch {
            expected: slots.len(),
            found: fields.len(),
        }));
    }

    for slot in slots {
        let name = slot.name.unwrap_or_default();
        let value = fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| encoder.error(CodecErrorKind::MissingField(name.to_string())))?;

        encoder.enter(PathSegment::Field(name.to_string()));
        encode_value(encoder, value, slot.ty, types)?;
        encoder.leave();
    }

    Ok(())
}

fn encode_positional<'v, C: 'v, I>(
    encoder: &mut Encoder,
    vals: I,
    len: usize,
    slots: &[Slot],
    types: &Registry,
) -> Result<()>
where
    I: Iterator<Item = &'v Value<C>>,
{
    if len != slots.len() {
        return Err(encoder.error(CodecErrorKind::LengthMismatch {
            expected: slots.len(),
            found: len,
        }));
    }

    for (idx, (val, slot)) in vals.zip(slots).enumerate() {
        let segment = match slot.name {
            Some(name) => PathSegment::Field(name.to_string()),
            None => PathSegment::Index(idx),
        };

        encoder.enter(segment);
        encode_value(encoder, val, slot.ty, types)?;
        encoder.leave();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Field, RegistryBuilder, TypeEntry, Variant as TypeVariant};
    use hex_literal::hex;

    fn primitive(b: &mut RegistryBuilder, p: Primitive) -> TypeId {
        b.insert(TypeEntry::new(TypeDefinition::Primitive(p)))
    }

    #[test]
    fn variant_encodes_declared_index() {
        let mut b = Registry::builder();
        let u32_ty = primitive(&mut b, Primitive::U32);
        let ty = b.insert(TypeEntry::new(TypeDefinition::Variant(vec![
            TypeVariant::new(0, "A", vec![]),
            TypeVariant::new(3, "B", vec![Field::unnamed(u32_ty)]),
        ])));
        let types = b.build().unwrap();

        let b7 = Value::unnamed_variant("B", [Value::u128(7)]);
        assert_eq!(b7.encode_as(ty, &types).unwrap(), hex!("0307000000"));
        assert_eq!(
            Value::unnamed_variant("A", []).encode_as(ty, &types).unwrap(),
            hex!("00")
        );

        let err = Value::unnamed_variant("C", []).encode_as(ty, &types).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::UnknownVariant("C".into()));
    }

    #[test]
    fn named_fields_are_matched_by_name() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let bool_ty = primitive(&mut b, Primitive::Bool);
        let ty = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![
            Field::named("a", u8_ty),
            Field::named("b", bool_ty),
        ])));
        let types = b.build().unwrap();

        // Wire order follows the type, not the value.
        let value = Value::named([("b", Value::bool(true)), ("a", Value::u128(5))]);
        assert_eq!(value.encode_as(ty, &types).unwrap(), vec![5, 1]);

        let positional = Value::sequence([Value::u128(5), Value::bool(true)]);
        assert_eq!(positional.encode_as(ty, &types).unwrap(), vec![5, 1]);

        let missing = Value::named([("a", Value::u128(5)), ("c", Value::bool(true))]);
        let err = missing.encode_as(ty, &types).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::MissingField("b".into()));
    }

    #[test]
    fn single_field_wrappers_are_transparent() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let bytes = b.insert(TypeEntry::new(TypeDefinition::Array {
            element: u8_ty,
            len: 4,
        }));
        let account = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![Field::unnamed(
            bytes,
        )])));
        let types = b.build().unwrap();

        let raw = Value::bytes([1, 2, 3, 4]);
        assert_eq!(raw.encode_as(account, &types).unwrap(), vec![1, 2, 3, 4]);

        let wrapped = Value::sequence([Value::bytes([1, 2, 3, 4])]);
        assert_eq!(wrapped.encode_as(account, &types).unwrap(), vec![1, 2, 3, 4]);

        // A sequence of four bytes is the inner array, not the wrapper.
        let elements = Value::sequence((1..=4u8).map(Value::from));
        assert_eq!(elements.encode_as(account, &types).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn integer_ranges_are_checked() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let i8_ty = primitive(&mut b, Primitive::I8);
        let compact = b.insert(TypeEntry::new(TypeDefinition::Compact(u8_ty)));
        let types = b.build().unwrap();

        assert_eq!(Value::u128(255).encode_as(u8_ty, &types).unwrap(), vec![255]);
        assert!(Value::u128(256).encode_as(u8_ty, &types).is_err());
        assert!(Value::i128(-1).encode_as(u8_ty, &types).is_err());
        assert_eq!(Value::i128(-1).encode_as(i8_ty, &types).unwrap(), vec![0xff]);
        assert!(Value::i128(-129).encode_as(i8_ty, &types).is_err());
        assert_eq!(Value::u128(127).encode_as(i8_ty, &types).unwrap(), vec![0x7f]);

        assert_eq!(Value::u128(64).encode_as(compact, &types).unwrap(), hex!("0101"));
        assert_eq!(
            Value::u128(256).encode_as(compact, &types).unwrap_err().kind(),
            &CodecErrorKind::IntegerOutOfRange { bits: 8 }
        );
    }

    #[test]
    fn shape_mismatch_names_both_sides() {
        let mut b = Registry::builder();
        let u32_ty = primitive(&mut b, Primitive::U32);
        let ty = b.insert(
            TypeEntry::new(TypeDefinition::Variant(vec![TypeVariant::new(
                0,
                "A",
                vec![Field::unnamed(u32_ty)],
            )]))
            .with_path(["pallet", "Call"]),
        );
        let types = b.build().unwrap();

        let err = Value::bool(true).encode_as(ty, &types).unwrap_err();
        assert_eq!(
            err.kind(),
            &CodecErrorKind::ValueMismatch {
                expected: "pallet::Call".into(),
                found: "bool"
            }
        );
    }

    #[test]
    fn fixed_length_is_enforced() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let arr = b.insert(TypeEntry::new(TypeDefinition::Array {
            element: u8_ty,
            len: 32,
        }));
        let types = b.build().unwrap();

        let err = Value::bytes([0u8; 31]).encode_as(arr, &types).unwrap_err();
        assert_eq!(
            err.kind(),
            &CodecErrorKind::LengthMismatch {
                expected: 32,
                found: 31
            }
        );
    }

    #[test]
    fn nesting_is_bounded() {
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
        let types = b.build().unwrap();

        let nest = |depth: usize| {
            (0..depth).fold(Value::unnamed_variant("None", []), |inner, _| {
                Value::unnamed_variant("Some", [inner])
            })
        };

        assert_eq!(nest(3).encode_as(list, &types).unwrap(), vec![1, 1, 1, 0]);
        let err = nest(1_000).encode_as(list, &types).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::TooDeep { limit: crate::codec::MAX_DEPTH });
    }

    #[test]
    fn failed_wrapper_attempt_leaves_no_path_behind() {
        let mut b = Registry::builder();
        let u8_ty = primitive(&mut b, Primitive::U8);
        let bool_ty = primitive(&mut b, Primitive::Bool);
        let arr = b.insert(TypeEntry::new(TypeDefinition::Array {
            element: u8_ty,
            len: 1,
        }));
        let wrapper = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![Field::unnamed(arr)])));
        let outer = b.insert(TypeEntry::new(TypeDefinition::Composite(vec![
            Field::named("w", wrapper),
            Field::named("flag", bool_ty),
        ])));
        let types = b.build().unwrap();

        // `[5]` first fails as the wrapper's fields, then fits the inner array.
        let ok = Value::named([("w", Value::sequence([Value::u128(5)])), ("flag", Value::bool(true))]);
        let mut encoder = Encoder::new();
        encode_value(&mut encoder, &ok, outer, &types).unwrap();
        assert!(encoder.path().is_root());
        assert_eq!(encoder.into_inner(), vec![5, 1]);

        let bad = Value::named([("w", Value::sequence([Value::u128(5)])), ("flag", Value::u128(9))]);
        let err = bad.encode_as(outer, &types).unwrap_err();
        assert_eq!(err.path().to_string(), ".flag");
    }
}
