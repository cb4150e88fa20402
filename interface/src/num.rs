//! Wide integers used by the dynamic [`Value`](crate::value::Value) model.
//!
//! Unsigned integers of any width up to 512 bits are held in a [`U512`]. Signed
//! integers are held in an [`I512`], a two's complement wrapper around the same
//! limb array.

use std::fmt;

pub use primitive_types::{U256, U512};

const BITS: usize = 512;

/// A 512-bit signed integer in two's complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct I512(U512);

impl I512 {
    pub fn zero() -> Self {
        I512(U512::zero())
    }
    pub fn is_negative(&self) -> bool {
        self.0.bit(BITS - 1)
    }
    /// The absolute value.
    pub fn magnitude(&self) -> U512 {
        if self.is_negative() {
            (!self.0).overflowing_add(U512::one()).0
        } else {
            self.0
        }
    }
    /// Builds the value from a magnitude and a sign. Returns `None` if the
    /// magnitude does not fit.
    pub fn from_sign_magnitude(negative: bool, magnitude: U512) -> Option<Self> {
        let limit = U512::one() << (BITS - 1);

        match negative {
            false if magnitude < limit => Some(I512(magnitude)),
            true if magnitude <= limit => Some(I512((!magnitude).overflowing_add(U512::one()).0)),
            _ => None,
        }
    }
    /// Reads a little endian two's complement integer of `bytes.len()` bytes,
    /// extending the sign. At most 64 bytes are accepted.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > BITS / 8 {
            return None;
        }

        let negative = bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false);
        let mut buf = [if negative { 0xff } else { 0x00 }; BITS / 8];
        buf[..bytes.len()].copy_from_slice(bytes);

        Some(I512(U512::from_little_endian(&buf)))
    }
    /// Writes the value as a little endian two's complement integer of `width`
    /// bytes. Returns `None` if the value is out of range for that width.
    pub fn to_le_bytes(&self, width: usize) -> Option<Vec<u8>> {
        if width == 0 || width > BITS / 8 {
            return None;
        }

        let magnitude = self.magnitude();
        let limit = U512::one() << (width * 8 - 1);
        let fits = if self.is_negative() {
            magnitude <= limit
        } else {
            magnitude < limit
        };
        if !fits {
            return None;
        }

        let mut buf = [0; BITS / 8];
        self.0.to_little_endian(&mut buf);
        Some(buf[..width].to_vec())
    }
    pub fn to_i128(&self) -> Option<i128> {
        let bytes = self.to_le_bytes(16)?;
        let mut buf = [0; 16];
        buf.copy_from_slice(&bytes);
        Some(i128::from_le_bytes(buf))
    }
    /// Number of bits required to represent the value in two's complement,
    /// including the sign bit.
    pub fn bits(&self) -> usize {
        if self.is_negative() {
            (!self.0).bits() + 1
        } else {
            self.0.bits() + 1
        }
    }
}

macro_rules! impl_from_signed {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for I512 {
                fn from(val: $ty) -> Self {
                    let val = val as i128;
                    if val < 0 {
                        // -(val + 1) cannot overflow, even for `i128::MIN`.
                        I512(!U512::from((-(val + 1)) as u128))
                    } else {
                        I512(U512::from(val as u128))
                    }
                }
            }
        )*
    };
}

impl_from_signed!(i8, i16, i32, i64, i128, isize);

impl fmt::Display for I512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}", self.magnitude())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        let minus_one = I512::from_le_bytes(&[0xff]).unwrap();
        assert_eq!(minus_one, I512::from(-1i8));
        assert_eq!(minus_one.to_i128(), Some(-1));
        assert_eq!(minus_one.to_le_bytes(4), Some(vec![0xff; 4]));

        let positive = I512::from_le_bytes(&[0x7f]).unwrap();
        assert_eq!(positive.to_i128(), Some(127));
    }

    #[test]
    fn range_checks_per_width() {
        assert_eq!(I512::from(127i32).to_le_bytes(1), Some(vec![0x7f]));
        assert_eq!(I512::from(128i32).to_le_bytes(1), None);
        assert_eq!(I512::from(-128i32).to_le_bytes(1), Some(vec![0x80]));
        assert_eq!(I512::from(-129i32).to_le_bytes(1), None);
        assert_eq!(I512::from(i128::MIN).to_i128(), Some(i128::MIN));
        assert_eq!(I512::from(i128::MAX).to_i128(), Some(i128::MAX));
    }

    #[test]
    fn sign_magnitude() {
        let v = I512::from_sign_magnitude(true, U512::from(5)).unwrap();
        assert_eq!(v, I512::from(-5i64));
        assert_eq!(v.magnitude(), U512::from(5));
        assert_eq!(v.to_string(), "-5");
        assert!(I512::from_sign_magnitude(false, U512::MAX).is_none());
    }

    #[test]
    fn bit_length() {
        assert_eq!(I512::zero().bits(), 1);
        assert_eq!(I512::from(127i8).bits(), 8);
        assert_eq!(I512::from(-128i16).bits(), 8);
        assert_eq!(I512::from(-129i16).bits(), 9);
    }
}
