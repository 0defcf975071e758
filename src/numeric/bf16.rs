//! bfloat16 conversions.
//!
//! bf16 is the top half of an f32, so decoding is a shift and no table is
//! needed.

#[inline]
pub fn bf16_to_fp32(h: u16) -> f32 {
    f32::from_bits((h as u32) << 16)
}

/// Encode an f32 as bf16, rounding to nearest even.
///
/// NaN payloads are truncated and the quiet bit is forced so the result can
/// never read as infinity.
#[inline]
pub fn fp32_to_bf16(f: f32) -> u16 {
    let u = f.to_bits();
    if (u & 0x7FFF_FFFF) > 0x7F80_0000 {
        return ((u >> 16) | 64) as u16;
    }
    ((u + (0x7FFF + ((u >> 16) & 1))) >> 16) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_is_shift() {
        assert_eq!(bf16_to_fp32(0x3F80), 1.0);
        assert_eq!(bf16_to_fp32(0xC000), -2.0);
        assert_eq!(bf16_to_fp32(0x7F80), f32::INFINITY);
        assert_eq!(bf16_to_fp32(0x8000).to_bits(), 0x8000_0000);
    }

    #[test]
    fn test_encode_ties_to_even() {
        // Bit 15 set with nothing below it is an exact tie.
        assert_eq!(fp32_to_bf16(f32::from_bits(0x3F80_8000)), 0x3F80);
        assert_eq!(fp32_to_bf16(f32::from_bits(0x3F81_8000)), 0x3F82);
        // Just above the tie rounds up regardless of parity.
        assert_eq!(fp32_to_bf16(f32::from_bits(0x3F80_8001)), 0x3F81);
        assert_eq!(fp32_to_bf16(f32::from_bits(0x3F80_7FFF)), 0x3F80);
    }

    #[test]
    fn test_encode_overflow_rounds_to_infinity() {
        assert_eq!(fp32_to_bf16(f32::MAX), 0x7F80);
        assert_eq!(fp32_to_bf16(f32::INFINITY), 0x7F80);
        assert_eq!(fp32_to_bf16(f32::NEG_INFINITY), 0xFF80);
    }

    #[test]
    fn test_encode_nan_is_quieted() {
        // Signalling NaN whose payload lives entirely in the truncated half.
        let h = fp32_to_bf16(f32::from_bits(0x7F80_0001));
        assert_eq!(h, 0x7FC0);
        let back = bf16_to_fp32(h);
        assert!(back.is_nan());
        assert_ne!(back.to_bits() & 0x0040_0000, 0);

        assert_eq!(fp32_to_bf16(f32::from_bits(0xFF80_0001)), 0xFFC0);
    }

    #[test]
    fn test_matches_half_on_samples() {
        let mut bits: u32 = 0;
        loop {
            let f = f32::from_bits(bits);
            assert_eq!(
                fp32_to_bf16(f),
                half::bf16::from_f32(f).to_bits(),
                "input {:#010x}",
                bits
            );
            match bits.checked_add(0x0000_7FF3) {
                Some(next) => bits = next,
                None => break,
            }
        }
    }
}
