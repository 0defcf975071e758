//! Shared CLI utilities for the strata-core binary tools.

use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::numeric::{self, Bf16, Fp16};

/// Initialize tracing/logging to stderr.
///
/// If `disable` is true, no output is produced.
/// Otherwise respects `RUST_LOG` env var, defaulting to WARN.
pub fn init_logging(disable: bool) {
    use tracing_subscriber::EnvFilter;

    if disable {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 16-bit storage format selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFormat {
    F16,
    Bf16,
}

impl NumericFormat {
    pub fn name(&self) -> &'static str {
        match self {
            NumericFormat::F16 => "f16",
            NumericFormat::Bf16 => "bf16",
        }
    }

    /// Narrow `value` to this format and widen it back.
    pub fn encode(&self, value: f32) -> Conversion {
        let bits = match self {
            NumericFormat::F16 => numeric::fp32_to_fp16(value).to_bits(),
            NumericFormat::Bf16 => numeric::fp32_to_bf16(value).to_bits(),
        };
        Conversion {
            format: *self,
            input: Some(value),
            bits,
            value: self.decode_bits(bits),
        }
    }

    /// Widen a raw bit pattern of this format.
    pub fn decode(&self, bits: u16) -> Conversion {
        Conversion {
            format: *self,
            input: None,
            bits,
            value: self.decode_bits(bits),
        }
    }

    fn decode_bits(&self, bits: u16) -> f32 {
        match self {
            NumericFormat::F16 => numeric::fp16_to_fp32(Fp16::from_bits(bits)),
            NumericFormat::Bf16 => numeric::bf16_to_fp32(Bf16::from_bits(bits)),
        }
    }
}

impl FromStr for NumericFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "f16" | "fp16" => Ok(NumericFormat::F16),
            "bf16" => Ok(NumericFormat::Bf16),
            _ => Err(CoreError::UnknownFormat(s.to_string())),
        }
    }
}

/// One value pushed through a 16-bit codec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub format: NumericFormat,
    /// The f32 that was encoded, absent when decoding raw bits.
    pub input: Option<f32>,
    pub bits: u16,
    /// The 16-bit value widened back to f32.
    pub value: f32,
}

impl Conversion {
    /// Whether encoding lost information. NaN inputs count as exact when
    /// they stay NaN.
    pub fn is_exact(&self) -> bool {
        match self.input {
            Some(x) if x.is_nan() => self.value.is_nan(),
            Some(x) => x == self.value,
            None => true,
        }
    }
}

/// Parse a 16-bit pattern written as hex (`0x3c00`, `3C00`) or `0b` binary.
pub fn parse_bits(s: &str) -> Result<u16> {
    let t = s.trim();
    let parsed = if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        u16::from_str_radix(bin, 2)
    } else {
        let hex = t
            .strip_prefix("0x")
            .or_else(|| t.strip_prefix("0X"))
            .unwrap_or(t);
        u16::from_str_radix(hex, 16)
    };
    parsed.map_err(|_| CoreError::InvalidBitPattern(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bits_hex() {
        assert_eq!(parse_bits("0x3c00").unwrap(), 0x3C00);
        assert_eq!(parse_bits("0X7BFF").unwrap(), 0x7BFF);
        assert_eq!(parse_bits("  fc00 ").unwrap(), 0xFC00);
    }

    #[test]
    fn test_parse_bits_binary() {
        assert_eq!(parse_bits("0b0011110000000000").unwrap(), 0x3C00);
    }

    #[test]
    fn test_parse_bits_rejects_garbage() {
        for bad in ["", "0x", "xyz", "0x1ffff", "0b2"] {
            let err = parse_bits(bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidBitPattern(_)), "input {:?}", bad);
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("f16".parse::<NumericFormat>().unwrap(), NumericFormat::F16);
        assert_eq!("FP16".parse::<NumericFormat>().unwrap(), NumericFormat::F16);
        assert_eq!("bf16".parse::<NumericFormat>().unwrap(), NumericFormat::Bf16);
        let err = "f8".parse::<NumericFormat>().unwrap_err();
        assert!(err.to_string().contains("Options: f16, bf16"));
    }

    #[test]
    fn test_encode_exact_and_inexact() {
        let c = NumericFormat::F16.encode(1.0);
        assert_eq!(c.bits, 0x3C00);
        assert!(c.is_exact());

        let c = NumericFormat::F16.encode(0.1);
        assert_eq!(c.bits, 0x2E66);
        assert!(!c.is_exact());

        let c = NumericFormat::Bf16.encode(1.0);
        assert_eq!(c.bits, 0x3F80);
        assert_eq!(c.value, 1.0);
    }

    #[test]
    fn test_encode_nan_is_exact() {
        let c = NumericFormat::Bf16.encode(f32::NAN);
        assert!(c.value.is_nan());
        assert!(c.is_exact());
    }

    #[test]
    fn test_decode() {
        let c = NumericFormat::F16.decode(0x7BFF);
        assert_eq!(c.value, 65504.0);
        assert_eq!(c.input, None);
        assert_eq!(NumericFormat::Bf16.decode(0xC000).value, -2.0);
    }

    #[test]
    fn test_init_logging_disabled_does_not_panic() {
        init_logging(true);
    }
}
