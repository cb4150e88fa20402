//! Bit sequences as encoded by `bitvec::BitVec<Store, Order>`.
//!
//! The in memory form is a plain list of bits, independent of the bit order.
//! The order and store width only matter at the encoding boundary.

use crate::codec::{CodecErrorKind, Decoder, Encoder, Result};
use crate::metadata::BitOrder;
use crate::num::U512;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSequence(Vec<bool>);

impl BitSequence {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn push(&mut self, bit: bool) {
        self.0.push(bit);
    }
    pub fn get(&self, idx: usize) -> Option<bool> {
        self.0.get(idx).copied()
    }
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }
    /// Decodes a compact bit count followed by the packed store elements.
    /// `store_bits` is the width of the store type (8, 16, 32 or 64).
    pub fn decode(decoder: &mut Decoder<'_>, store_bits: usize, order: BitOrder) -> Result<Self> {
        check_store(store_bits).map_err(|kind| decoder.error(kind))?;

        let len = decoder.read_compact_len()?;
        let elements = (len + store_bits - 1) / store_bits;
        let bytes = decoder.read_bytes(elements * store_bits / 8)?;

        let mut bits = Vec::with_capacity(len);
        for (idx, chunk) in bytes.chunks(store_bits / 8).enumerate() {
            let element = U512::from_little_endian(chunk);
            let available = (len - idx * store_bits).min(store_bits);

            for pos in 0..store_bits {
                let bit = match order {
                    BitOrder::Lsb0 => pos,
                    BitOrder::Msb0 => store_bits - 1 - pos,
                };
                if pos < available {
                    bits.push(element.bit(bit));
                } else if element.bit(bit) {
                    // Padding must be zero, otherwise re-encoding changes the bytes.
                    return Err(decoder.error(CodecErrorKind::NonZeroBitPadding { len }));
                }
            }
        }

        Ok(BitSequence(bits))
    }
    pub fn encode(&self, encoder: &mut Encoder, store_bits: usize, order: BitOrder) -> Result<()> {
        check_store(store_bits).map_err(|kind| encoder.error(kind))?;

        encoder.write_compact_len(self.0.len());
        for chunk in self.0.chunks(store_bits) {
            let mut element: u64 = 0;
            for (pos, bit) in chunk.iter().enumerate() {
                if *bit {
                    let shift = match order {
                        BitOrder::Lsb0 => pos,
                        BitOrder::Msb0 => store_bits - 1 - pos,
                    };
                    element |= 1 << shift;
                }
            }

            encoder.push_bytes(&element.to_le_bytes()[..store_bits / 8]);
        }

        Ok(())
    }
}

fn check_store(store_bits: usize) -> std::result::Result<(), CodecErrorKind> {
    match store_bits {
        8 | 16 | 32 | 64 => Ok(()),
        other => Err(CodecErrorKind::ValueMismatch {
            expected: "bit store of 8, 16, 32 or 64 bits".to_string(),
            found: match other {
                0 => "zero sized store",
                _ => "unsupported store",
            },
        }),
    }
}

impl From<Vec<bool>> for BitSequence {
    fn from(val: Vec<bool>) -> Self {
        BitSequence(val)
    }
}

impl FromIterator<bool> for BitSequence {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        BitSequence(iter.into_iter().collect())
    }
}
