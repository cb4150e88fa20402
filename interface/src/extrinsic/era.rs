use parity_scale_codec::{Decode, Encode, Error as ScaleError, Input, Output};

/// The period during which a transaction is valid.
///
/// A mortal transaction is valid for `period` blocks, starting at the block
/// whose number modulo `period` equals `phase`. The block hash of that
/// starting block is part of the signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Era {
    #[default]
    Immortal,
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// A mortal era of (at least) `period` blocks, starting at block
    /// `current`.
    ///
    /// The period is rounded up to the next power of two between 4 and
    /// 65536. Periods above 4096 lose precision in the phase, which is
    /// rounded down to a multiple of `period / 4096`.
    pub fn mortal(period: u64, current: u64) -> Self {
        let period = period
            .checked_next_power_of_two()
            .unwrap_or(1 << 16)
            .clamp(4, 1 << 16);
        let phase = current % period;
        let quantize_factor = (period >> 12).max(1);

        Era::Mortal {
            period,
            phase: phase / quantize_factor * quantize_factor,
        }
    }
    pub fn is_immortal(&self) -> bool {
        matches!(self, Era::Immortal)
    }
    /// The number of the first block this era is valid at, given a block
    /// `current` within the era.
    pub fn birth(&self, current: u64) -> u64 {
        match self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => (current.max(*phase) - phase) / period * period + phase,
        }
    }
    /// The number of the first block this era is no longer valid at.
    pub fn death(&self, current: u64) -> u64 {
        match self {
            Era::Immortal => u64::MAX,
            Era::Mortal { period, .. } => self.birth(current) + period,
        }
    }
}

impl Encode for Era {
    fn size_hint(&self) -> usize {
        match self {
            Era::Immortal => 1,
            Era::Mortal { .. } => 2,
        }
    }
    fn encode_to<T: Output + ?Sized>(&self, dest: &mut T) {
        match self {
            Era::Immortal => dest.push_byte(0),
            Era::Mortal { period, phase } => {
                let quantize_factor = (*period >> 12).max(1);
                // Low four bits: log2 of the period minus one. The rest: the
                // quantized phase.
                let encoded = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16
                    | ((phase / quantize_factor) << 4) as u16;
                encoded.encode_to(dest);
            }
        }
    }
}

impl Decode for Era {
    fn decode<I: Input>(input: &mut I) -> Result<Self, ScaleError> {
        let first = input.read_byte()?;
        if first == 0 {
            return Ok(Era::Immortal);
        }

        let encoded = first as u64 + ((input.read_byte()? as u64) << 8);
        let period = 2 << (encoded % (1 << 4));
        let quantize_factor = (period >> 12).max(1);
        let phase = (encoded >> 4) * quantize_factor;

        if period >= 4 && phase < period {
            Ok(Era::Mortal { period, phase })
        } else {
            Err("Invalid period and phase".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immortal() {
        assert_eq!(Era::Immortal.encode(), vec![0]);
        assert_eq!(Era::decode(&mut &[0u8][..]).unwrap(), Era::Immortal);
        assert_eq!(Era::Immortal.birth(1_000), 0);
        assert_eq!(Era::Immortal.death(1_000), u64::MAX);
    }

    #[test]
    fn mortal_encoding() {
        let era = Era::mortal(64, 42);
        assert_eq!(era, Era::Mortal { period: 64, phase: 42 });
        assert_eq!(era.encode(), vec![0xa5, 0x02]);
        assert_eq!(Era::decode(&mut &[0xa5u8, 0x02][..]).unwrap(), era);

        let era = Era::mortal(64, 61);
        assert_eq!(Era::decode(&mut era.encode().as_slice()).unwrap(), era);
    }

    #[test]
    fn period_is_rounded_and_clamped() {
        assert_eq!(Era::mortal(100, 250), Era::Mortal { period: 128, phase: 122 });
        assert_eq!(Era::mortal(1, 7), Era::Mortal { period: 4, phase: 3 });
        assert_eq!(Era::mortal(0, 7), Era::Mortal { period: 4, phase: 3 });
        assert_eq!(
            Era::mortal(100_000, 100_005),
            Era::Mortal {
                period: 65_536,
                phase: 34_464
            }
        );
        assert_eq!(
            Era::mortal(u64::MAX, 100_005),
            Era::Mortal {
                period: 65_536,
                phase: 34_464
            }
        );
    }

    #[test]
    fn quantized_phase_round_trips() {
        // 8192 blocks, quantize factor 2.
        let era = Era::mortal(8192, 8191);
        assert_eq!(era, Era::Mortal { period: 8192, phase: 8190 });
        assert_eq!(Era::decode(&mut era.encode().as_slice()).unwrap(), era);

        let era = Era::mortal(1 << 16, (1 << 16) - 1);
        assert_eq!(Era::decode(&mut era.encode().as_slice()).unwrap(), era);
    }

    #[test]
    fn invalid_encodings() {
        // Period of 2.
        assert!(Era::decode(&mut &[0x10u8, 0x00][..]).is_err());
        // Phase 4 of a period of 4.
        assert!(Era::decode(&mut &[0x41u8, 0x00][..]).is_err());
        // Missing second byte.
        assert!(Era::decode(&mut &[0x05u8][..]).is_err());
    }

    #[test]
    fn birth_and_death() {
        let era = Era::mortal(64, 42);

        assert_eq!(era.birth(42), 42);
        assert_eq!(era.birth(100), 42);
        assert_eq!(era.death(100), 106);
        assert_eq!(era.birth(200), 170);
        assert_eq!(era.death(200), 234);
    }
}
