//! Portable fp16 conversions.
//!
//! Both directions work purely on IEEE 754 bit patterns and f32 arithmetic, so
//! they are exact on every target and serve as the fallback when no hardware
//! conversion is compiled in.

/// Decode an IEEE 754 binary16 pattern.
///
/// The exponent is re-biased by scaling the shifted pattern with 2^-112.
/// Subnormal inputs are rebuilt from a magic float with exponent 126 instead,
/// and the cutoff between the two paths is the smallest normal fp16 exponent.
#[inline]
pub fn fp16_to_fp32(h: u16) -> f32 {
    let w = (h as u32) << 16;
    let sign = w & 0x8000_0000;
    let two_w = w.wrapping_add(w);

    let exp_offset: u32 = 0xE0 << 23;
    let exp_scale = f32::from_bits(0x0780_0000);
    let normalized = f32::from_bits((two_w >> 4) + exp_offset) * exp_scale;

    let magic_mask: u32 = 126 << 23;
    let magic_bias = 0.5f32;
    let denormalized = f32::from_bits((two_w >> 17) | magic_mask) - magic_bias;

    let denormalized_cutoff: u32 = 1 << 27;
    let magnitude = if two_w < denormalized_cutoff {
        denormalized.to_bits()
    } else {
        normalized.to_bits()
    };
    f32::from_bits(sign | magnitude)
}

/// Encode an f32 as binary16, rounding to nearest even.
///
/// Values too large for fp16 saturate to infinity. Every NaN becomes the
/// canonical quiet NaN `0x7E00` carrying the input's sign.
#[inline]
pub fn fp32_to_fp16(f: f32) -> u16 {
    let scale_to_inf = f32::from_bits(0x7780_0000);
    let scale_to_zero = f32::from_bits(0x0880_0000);
    let mut base = (f.abs() * scale_to_inf) * scale_to_zero;

    let w = f.to_bits();
    let shl1_w = w.wrapping_add(w);
    let sign = w & 0x8000_0000;
    let mut bias = shl1_w & 0xFF00_0000;
    if bias < 0x7100_0000 {
        bias = 0x7100_0000;
    }

    base += f32::from_bits((bias >> 1) + 0x0780_0000);
    let bits = base.to_bits();
    let exp_bits = (bits >> 13) & 0x0000_7C00;
    let mantissa_bits = bits & 0x0000_0FFF;
    let nonsign = exp_bits + mantissa_bits;

    let magnitude = if shl1_w > 0xFF00_0000 { 0x7E00 } else { nonsign };
    ((sign >> 16) | magnitude) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_patterns() {
        assert_eq!(fp16_to_fp32(0x0000).to_bits(), 0x0000_0000);
        assert_eq!(fp16_to_fp32(0x8000).to_bits(), 0x8000_0000);
        assert_eq!(fp16_to_fp32(0x3C00), 1.0);
        assert_eq!(fp16_to_fp32(0xC000), -2.0);
        assert_eq!(fp16_to_fp32(0x7BFF), 65504.0);
        assert_eq!(fp16_to_fp32(0x7C00), f32::INFINITY);
        assert_eq!(fp16_to_fp32(0xFC00), f32::NEG_INFINITY);
        assert_eq!(fp16_to_fp32(0x0001), 2f32.powi(-24));
        assert!(fp16_to_fp32(0x7E00).is_nan());
    }

    #[test]
    fn test_decode_matches_half_exhaustively() {
        for h in 0..=u16::MAX {
            let expected = half::f16::from_bits(h).to_f32();
            let actual = fp16_to_fp32(h);
            if expected.is_nan() {
                assert!(actual.is_nan(), "pattern {:#06x}", h);
            } else {
                assert_eq!(actual.to_bits(), expected.to_bits(), "pattern {:#06x}", h);
            }
        }
    }

    #[test]
    fn test_encode_known_values() {
        assert_eq!(fp32_to_fp16(0.0), 0x0000);
        assert_eq!(fp32_to_fp16(-0.0), 0x8000);
        assert_eq!(fp32_to_fp16(1.0), 0x3C00);
        assert_eq!(fp32_to_fp16(65504.0), 0x7BFF);
        assert_eq!(fp32_to_fp16(1.0e6), 0x7C00);
        assert_eq!(fp32_to_fp16(-1.0e6), 0xFC00);
        assert_eq!(fp32_to_fp16(f32::INFINITY), 0x7C00);
        assert_eq!(fp32_to_fp16(1.0e-10), 0x0000);
    }

    #[test]
    fn test_encode_nan_is_canonical_quiet() {
        assert_eq!(fp32_to_fp16(f32::NAN), 0x7E00);
        assert_eq!(fp32_to_fp16(f32::from_bits(0x7F80_0001)), 0x7E00);
        assert_eq!(fp32_to_fp16(f32::from_bits(0xFFC0_0000)), 0xFE00);
    }

    #[test]
    fn test_encode_rounds_ties_to_even() {
        // 1 + 2^-11 sits halfway between 0x3C00 and 0x3C01.
        assert_eq!(fp32_to_fp16(1.0 + 2f32.powi(-11)), 0x3C00);
        // 1 + 3 * 2^-11 sits halfway between 0x3C01 and 0x3C02.
        assert_eq!(fp32_to_fp16(1.0 + 3.0 * 2f32.powi(-11)), 0x3C02);
    }

    #[test]
    fn test_encode_roundtrips_every_finite_pattern() {
        for h in 0..=u16::MAX {
            if (h & 0x7C00) == 0x7C00 && (h & 0x03FF) != 0 {
                continue;
            }
            assert_eq!(fp32_to_fp16(fp16_to_fp32(h)), h, "pattern {:#06x}", h);
        }
    }

    #[test]
    fn test_encode_matches_half_on_samples() {
        // Walk the f32 space with a stride that touches every exponent and
        // plenty of mantissas, including halfway points.
        let mut bits: u32 = 0;
        loop {
            let f = f32::from_bits(bits);
            if !f.is_nan() {
                let expected = half::f16::from_f32(f).to_bits();
                assert_eq!(fp32_to_fp16(f), expected, "input {:#010x}", bits);
            }
            match bits.checked_add(0x0001_0FFF) {
                Some(next) => bits = next,
                None => break,
            }
        }
    }
}
