//! Hardware fp16 conversions, chosen at build time.
//!
//! With the `hw-fp16` feature, x86 targets built with `f16c` use the
//! `vcvtph2ps`/`vcvtps2ph` instructions and aarch64 goes through `half`, which
//! lowers to `fcvt`. Every other build falls back to [`super::soft`].

#[cfg(all(
    feature = "hw-fp16",
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "f16c"
))]
mod imp {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    pub const BACKEND: &str = "f16c";

    #[inline]
    pub fn fp16_to_fp32(h: u16) -> f32 {
        // SAFETY: this module is only compiled when f16c is enabled.
        #[allow(unused_unsafe)]
        unsafe {
            _mm_cvtss_f32(_mm_cvtph_ps(_mm_cvtsi32_si128(h as i32)))
        }
    }

    #[inline]
    pub fn fp32_to_fp16(f: f32) -> u16 {
        // SAFETY: this module is only compiled when f16c is enabled.
        #[allow(unused_unsafe)]
        unsafe {
            _mm_extract_epi16::<0>(_mm_cvtps_ph::<_MM_FROUND_TO_NEAREST_INT>(_mm_set_ss(f))) as u16
        }
    }
}

#[cfg(all(feature = "hw-fp16", target_arch = "aarch64"))]
mod imp {
    pub const BACKEND: &str = "aarch64";

    #[inline]
    pub fn fp16_to_fp32(h: u16) -> f32 {
        half::f16::from_bits(h).to_f32()
    }

    #[inline]
    pub fn fp32_to_fp16(f: f32) -> u16 {
        half::f16::from_f32(f).to_bits()
    }
}

#[cfg(not(any(
    all(
        feature = "hw-fp16",
        any(target_arch = "x86", target_arch = "x86_64"),
        target_feature = "f16c"
    ),
    all(feature = "hw-fp16", target_arch = "aarch64")
)))]
mod imp {
    pub const BACKEND: &str = "soft";

    pub use super::super::soft::{fp16_to_fp32, fp32_to_fp16};
}

pub use imp::{fp16_to_fp32, fp32_to_fp16, BACKEND};
