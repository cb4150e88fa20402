//! Low level SCALE primitives shared by the dynamic codec: a cursor based
//! [`Decoder`], an [`Encoder`] and the compact integer format.
//!
//! Both sides track a [`CodecPath`] so that a failure deep inside of a nested
//! value can be located, e.g. `.dest::Id[3]`.

use crate::metadata::TypeId;
use crate::num::U512;
use std::fmt;

/// A step into a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
    Variant(String),
}

/// Location inside of a value being encoded or decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecPath(Vec<PathSegment>);

impl CodecPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PathSegment>> for CodecPath {
    fn from(val: Vec<PathSegment>) -> Self {
        CodecPath(val)
    }
}

impl fmt::Display for CodecPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }

        for segment in &self.0 {
            match segment {
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
                PathSegment::Variant(name) => write!(f, "::{}", name)?,
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecErrorKind {
    #[error("ran out of input, needed {needed} bytes but {remaining} remain")]
    OutOfInput { needed: usize, remaining: usize },
    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),
    #[error("invalid discriminant 0x{byte:02x} for {ty}")]
    InvalidDiscriminant { byte: u8, ty: String },
    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),
    #[error("invalid option tag 0x{0:02x}")]
    InvalidOptionTag(u8),
    #[error("compact integer does not fit into {bits} bits")]
    CompactOverflow { bits: usize },
    #[error("compact integer is not canonically encoded")]
    NonCanonicalCompact,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("0x{0:08x} is not a valid char")]
    InvalidChar(u32),
    #[error("expected {expected} elements, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("type {0} not found in the registry")]
    TypeNotFound(TypeId),
    #[error("cannot use a {found} value as {expected}")]
    ValueMismatch { expected: String, found: &'static str },
    #[error("integer does not fit into {bits} bits")]
    IntegerOutOfRange { bits: usize },
    #[error("no variant named {0}")]
    UnknownVariant(String),
    #[error("missing field {0}")]
    MissingField(String),
    #[error("{0} cannot be compact encoded")]
    NotCompactable(String),
    #[error("bit sequence of {len} bits has non zero padding")]
    NonZeroBitPadding { len: usize },
    #[error("value is nested deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Maximum nesting of values, bounding the recursion on untrusted input.
pub const MAX_DEPTH: usize = 256;

/// A failure while encoding or decoding, together with its location.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {path}")]
pub struct CodecError {
    kind: CodecErrorKind,
    path: CodecPath,
}

impl CodecError {
    pub fn new(kind: CodecErrorKind, path: CodecPath) -> Self {
        CodecError { kind, path }
    }
    pub fn kind(&self) -> &CodecErrorKind {
        &self.kind
    }
    pub fn path(&self) -> &CodecPath {
        &self.path
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Cursor over an input buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    input: &'a [u8],
    path: CodecPath,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Decoder {
            input,
            path: CodecPath::default(),
            depth: 0,
        }
    }
    /// Enters a nested value, failing past [`MAX_DEPTH`]. Every successful
    /// call must be paired with [`Decoder::ascend`].
    pub fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(CodecErrorKind::TooDeep { limit: MAX_DEPTH }));
        }

        self.depth += 1;
        Ok(())
    }
    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
    /// The bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.input
    }
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
    pub fn path(&self) -> &CodecPath {
        &self.path
    }
    pub fn enter(&mut self, segment: PathSegment) {
        self.path.0.push(segment);
    }
    pub fn leave(&mut self) {
        self.path.0.pop();
    }
    pub fn error(&self, kind: CodecErrorKind) -> CodecError {
        CodecError::new(kind, self.path.clone())
    }
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.input.len() < len {
            return Err(self.error(CodecErrorKind::OutOfInput {
                needed: len,
                remaining: self.input.len(),
            }));
        }

        let (head, tail) = self.input.split_at(len);
        self.input = tail;
        Ok(head)
    }
    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.error(CodecErrorKind::InvalidBool(other))),
        }
    }
    /// Reads the tag of an `Option`, returning whether a value follows.
    pub fn read_option_tag(&mut self) -> Result<bool> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.error(CodecErrorKind::InvalidOptionTag(other))),
        }
    }
    /// Reads a little endian unsigned integer of `width` bytes.
    pub fn read_uint(&mut self, width: usize) -> Result<U512> {
        Ok(U512::from_little_endian(self.read_bytes(width)?))
    }
    /// Reads a compact integer that must fit into `bits` bits.
    pub fn read_compact(&mut self, bits: usize) -> Result<U512> {
        let first = self.read_byte()?;

        let value = match first & 0b11 {
            0 => U512::from(first >> 2),
            1 => {
                let second = self.read_byte()?;
                let value = u16::from_le_bytes([first, second]) >> 2;
                if value <= 0b0011_1111 {
                    return Err(self.error(CodecErrorKind::NonCanonicalCompact));
                }
                U512::from(value)
            }
            2 => {
                let rest = self.read_bytes(3)?;
                let value = u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) >> 2;
                if value <= 0x3fff {
                    return Err(self.error(CodecErrorKind::NonCanonicalCompact));
                }
                U512::from(value)
            }
            _ => {
                let len = (first >> 2) as usize + 4;
                if len > (bits + 7) / 8 && len > 4 {
                    return Err(self.error(CodecErrorKind::CompactOverflow { bits }));
                }

                let bytes = self.read_bytes(len)?;
                if bytes[len - 1] == 0 {
                    return Err(self.error(CodecErrorKind::NonCanonicalCompact));
                }

                let value = U512::from_little_endian(bytes);
                if value <= U512::from(0x3fff_ffffu32) {
                    return Err(self.error(CodecErrorKind::NonCanonicalCompact));
                }
                value
            }
        };

        if value.bits() > bits {
            return Err(self.error(CodecErrorKind::CompactOverflow { bits }));
        }

        Ok(value)
    }
    /// Reads the compact length prefix of a collection.
    pub fn read_compact_len(&mut self) -> Result<usize> {
        Ok(self.read_compact(32)?.low_u32() as usize)
    }
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_compact_len()?;
        let bytes = self.read_bytes(len)?;

        String::from_utf8(bytes.to_vec()).map_err(|_| self.error(CodecErrorKind::InvalidUtf8))
    }
    /// Fails if any input is left.
    pub fn finish(self) -> Result<()> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(self.error(CodecErrorKind::TrailingBytes(self.input.len())))
        }
    }
}

/// Output buffer.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    out: Vec<u8>,
    path: CodecPath,
    depth: usize,
}

/// Position of an [`Encoder`] to go back to, see [`Encoder::rewind`].
#[derive(Debug, Clone, Copy)]
pub struct Mark {
    len: usize,
    path: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Default::default()
    }
    /// Same as [`Decoder::descend`].
    pub fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(CodecErrorKind::TooDeep { limit: MAX_DEPTH }));
        }

        self.depth += 1;
        Ok(())
    }
    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
    pub fn mark(&self) -> Mark {
        Mark {
            len: self.out.len(),
            path: self.path.0.len(),
        }
    }
    /// Drops the output and path segments added since `mark`.
    pub fn rewind(&mut self, mark: Mark) {
        self.out.truncate(mark.len);
        self.path.0.truncate(mark.path);
    }
    pub fn path(&self) -> &CodecPath {
        &self.path
    }
    pub fn enter(&mut self, segment: PathSegment) {
        self.path.0.push(segment);
    }
    pub fn leave(&mut self) {
        self.path.0.pop();
    }
    pub fn error(&self, kind: CodecErrorKind) -> CodecError {
        CodecError::new(kind, self.path.clone())
    }
    pub fn len(&self) -> usize {
        self.out.len()
    }
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }
    pub fn push_byte(&mut self, byte: u8) {
        self.out.push(byte);
    }
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }
    /// Writes `value` as a little endian unsigned integer of `width` bytes.
    pub fn write_uint(&mut self, value: &U512, width: usize) -> Result<()> {
        if value.bits() > width * 8 {
            return Err(self.error(CodecErrorKind::IntegerOutOfRange { bits: width * 8 }));
        }

        let mut buf = [0; 64];
        value.to_little_endian(&mut buf);
        self.out.extend_from_slice(&buf[..width]);
        Ok(())
    }
    pub fn write_compact(&mut self, value: &U512) {
        compact_encode_to(value, &mut self.out);
    }
    pub fn write_compact_len(&mut self, len: usize) {
        compact_encode_to(&U512::from(len), &mut self.out);
    }
    pub fn write_str(&mut self, s: &str) {
        self.write_compact_len(s.len());
        self.push_bytes(s.as_bytes());
    }
    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }
}

/// Appends the compact encoding of `value`, always choosing the smallest mode.
pub fn compact_encode_to(value: &U512, out: &mut Vec<u8>) {
    if *value <= U512::from(0b0011_1111u8) {
        out.push((value.low_u32() as u8) << 2);
    } else if *value <= U512::from(0x3fffu16) {
        out.extend_from_slice(&(((value.low_u32() as u16) << 2) | 0b01).to_le_bytes());
    } else if *value <= U512::from(0x3fff_ffffu32) {
        out.extend_from_slice(&((value.low_u32() << 2) | 0b10).to_le_bytes());
    } else {
        let len = ((value.bits() + 7) / 8).max(4);
        let mut buf = [0; 64];
        value.to_little_endian(&mut buf);

        out.push((((len - 4) as u8) << 2) | 0b11);
        out.extend_from_slice(&buf[..len]);
    }
}

pub fn compact_encode<T: Into<U512>>(value: T) -> Vec<u8> {
    let mut out = vec![];
    compact_encode_to(&value.into(), &mut out);
    out
}

/// Decodes a compact integer of at most `bits` bits from the front of `input`,
/// advancing it.
pub fn compact_decode(input: &mut &[u8], bits: usize) -> Result<U512> {
    let mut decoder = Decoder::new(input);
    let value = decoder.read_compact(bits)?;
    *input = decoder.remaining();
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use parity_scale_codec::{Compact, Encode};
    use proptest::prelude::*;

    #[test]
    fn compact_boundaries() {
        let cases: &[(u128, &[u8])] = &[
            (0, &hex!("00")),
            (1, &hex!("04")),
            (63, &hex!("fc")),
            (64, &hex!("0101")),
            (16383, &hex!("fdff")),
            (16384, &hex!("02000100")),
            ((1 << 30) - 1, &hex!("feffffff")),
            (1 << 30, &hex!("0300000040")),
            (u64::MAX as u128, &hex!("13ffffffffffffffff")),
            (
                u128::MAX,
                &hex!("33ffffffffffffffffffffffffffffffff"),
            ),
        ];

        for (value, expected) in cases {
            let encoded = compact_encode(*value);
            assert_eq!(&encoded, expected, "encoding {}", value);

            let mut input = &encoded[..];
            assert_eq!(compact_decode(&mut input, 128).unwrap(), U512::from(*value));
            assert!(input.is_empty());
        }
    }

    #[test]
    fn compact_overflow_is_rejected() {
        // u64::MAX does not fit into 32 bits.
        let encoded = compact_encode(u64::MAX);
        let err = compact_decode(&mut &encoded[..], 32).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::CompactOverflow { bits: 32 });

        // Big integer mode claiming 67 bytes.
        let err = compact_decode(&mut &hex!("ff")[..], 512).unwrap_err();
        assert_eq!(err.kind(), &CodecErrorKind::CompactOverflow { bits: 512 });

        // 2^32 fits in five bytes but not in a u32.
        let encoded = compact_encode(1u64 << 32);
        assert!(compact_decode(&mut &encoded[..], 32).is_err());
        assert!(compact_decode(&mut &encoded[..], 64).is_ok());
    }

    #[test]
    fn non_canonical_compact_is_rejected() {
        for bytes in [
            &hex!("0100")[..],
            &hex!("02000000"),
            &hex!("0300000000"),
            &hex!("07ffffffff00"),
        ] {
            let err = compact_decode(&mut &bytes[..], 128).unwrap_err();
            assert_eq!(err.kind(), &CodecErrorKind::NonCanonicalCompact, "{:?}", bytes);
        }
    }

    #[test]
    fn truncated_compact() {
        let err = compact_decode(&mut &hex!("13ffff")[..], 64).unwrap_err();
        assert_eq!(
            err.kind(),
            &CodecErrorKind::OutOfInput {
                needed: 8,
                remaining: 2
            }
        );
    }

    #[test]
    fn bool_and_option_tags() {
        let mut d = Decoder::new(&[0, 1, 2]);
        assert!(!d.read_bool().unwrap());
        assert!(d.read_bool().unwrap());
        assert_eq!(d.read_bool().unwrap_err().kind(), &CodecErrorKind::InvalidBool(2));

        let mut d = Decoder::new(&[1, 3]);
        assert!(d.read_option_tag().unwrap());
        assert_eq!(
            d.read_option_tag().unwrap_err().kind(),
            &CodecErrorKind::InvalidOptionTag(3)
        );
    }

    #[test]
    fn errors_carry_the_path() {
        let mut d = Decoder::new(&[]);
        d.enter(PathSegment::Field("dest".into()));
        d.enter(PathSegment::Variant("Id".into()));
        d.enter(PathSegment::Index(3));

        let err = d.read_byte().unwrap_err();
        assert_eq!(err.path().to_string(), ".dest::Id[3]");
        assert_eq!(
            err.to_string(),
            "ran out of input, needed 1 bytes but 0 remain at .dest::Id[3]"
        );

        d.leave();
        d.leave();
        d.leave();
        assert!(d.path().is_root());
    }

    #[test]
    fn trailing_bytes() {
        let mut d = Decoder::new(&[1, 2, 3]);
        d.read_byte().unwrap();
        assert_eq!(
            d.finish().unwrap_err().kind(),
            &CodecErrorKind::TrailingBytes(2)
        );
    }

    #[test]
    fn write_uint_checks_width() {
        let mut e = Encoder::new();
        e.write_uint(&U512::from(0x1234u32), 2).unwrap();
        assert_eq!(e.clone().into_inner(), vec![0x34, 0x12]);
        assert_eq!(
            e.write_uint(&U512::from(256u32), 1).unwrap_err().kind(),
            &CodecErrorKind::IntegerOutOfRange { bits: 8 }
        );
    }

    proptest! {
        #[test]
        fn compact_matches_parity_scale_codec(value: u128) {
            prop_assert_eq!(compact_encode(value), Compact(value).encode());

            let encoded = compact_encode(value);
            prop_assert_eq!(compact_decode(&mut &encoded[..], 128).unwrap(), U512::from(value));
        }
    }
}
