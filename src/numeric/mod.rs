//! 16-bit float storage formats.
//!
//! [`Fp16`] (IEEE 754 binary16) and [`Bf16`] (bfloat16) are storage-only bit
//! patterns: values are widened to `f32` to compute and narrowed back to store.
//!
//! Call [`init`] once during startup to build the fp16 decode table up front;
//! otherwise it is built on the first [`fp16_to_fp32`] call.

mod bf16;
mod hw;
pub mod soft;
mod table;

pub use table::{is_initialized, TABLE_LEN};

/// Name of the fp16 conversion path compiled into this build
/// (`"f16c"`, `"aarch64"` or `"soft"`).
pub const FP16_BACKEND: &str = hw::BACKEND;

/// IEEE 754 half-precision bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Fp16(u16);

/// bfloat16 bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Bf16(u16);

impl Fp16 {
    pub const ZERO: Fp16 = Fp16(0x0000);
    pub const ONE: Fp16 = Fp16(0x3C00);
    pub const INFINITY: Fp16 = Fp16(0x7C00);
    pub const MAX: Fp16 = Fp16(0x7BFF);

    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn to_bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn from_f32(f: f32) -> Self {
        fp32_to_fp16(f)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        fp16_to_fp32(self)
    }
}

impl Bf16 {
    pub const ZERO: Bf16 = Bf16(0x0000);
    pub const ONE: Bf16 = Bf16(0x3F80);

    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn to_bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn from_f32(f: f32) -> Self {
        fp32_to_bf16(f)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        bf16_to_fp32(self)
    }
}

impl From<half::f16> for Fp16 {
    fn from(v: half::f16) -> Self {
        Self(v.to_bits())
    }
}

impl From<Fp16> for half::f16 {
    fn from(v: Fp16) -> Self {
        half::f16::from_bits(v.0)
    }
}

impl From<half::bf16> for Bf16 {
    fn from(v: half::bf16) -> Self {
        Self(v.to_bits())
    }
}

impl From<Bf16> for half::bf16 {
    fn from(v: Bf16) -> Self {
        half::bf16::from_bits(v.0)
    }
}

/// Build the fp16 decode table. Safe to call any number of times.
pub fn init() {
    table::init();
}

/// Decode fp16 through the lookup table.
///
/// On aarch64 with hardware conversion the table is bypassed, since `fcvt`
/// beats a 256 KiB lookup.
#[inline]
pub fn fp16_to_fp32(h: Fp16) -> f32 {
    #[cfg(all(feature = "hw-fp16", target_arch = "aarch64"))]
    {
        hw::fp16_to_fp32(h.0)
    }
    #[cfg(not(all(feature = "hw-fp16", target_arch = "aarch64")))]
    {
        table::lookup(h.0)
    }
}

/// Decode fp16 without touching the lookup table.
#[inline]
pub fn compute_fp16_to_fp32(h: Fp16) -> f32 {
    hw::fp16_to_fp32(h.0)
}

#[inline]
pub fn fp32_to_fp16(f: f32) -> Fp16 {
    Fp16(hw::fp32_to_fp16(f))
}

#[inline]
pub fn bf16_to_fp32(h: Bf16) -> f32 {
    bf16::bf16_to_fp32(h.0)
}

#[inline]
pub fn fp32_to_bf16(f: f32) -> Bf16 {
    Bf16(bf16::fp32_to_bf16(f))
}

/// Decode a row of fp16 values into `dst`.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn fp16_to_fp32_row(src: &[Fp16], dst: &mut [f32]) {
    assert_eq!(src.len(), dst.len(), "fp16 row length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = fp16_to_fp32(s);
    }
}

/// Encode a row of f32 values into `dst`.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn fp32_to_fp16_row(src: &[f32], dst: &mut [Fp16]) {
    assert_eq!(src.len(), dst.len(), "fp16 row length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = fp32_to_fp16(s);
    }
}

pub fn bf16_to_fp32_row(src: &[Bf16], dst: &mut [f32]) {
    assert_eq!(src.len(), dst.len(), "bf16 row length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = bf16_to_fp32(s);
    }
}

pub fn fp32_to_bf16_row(src: &[f32], dst: &mut [Bf16]) {
    assert_eq!(src.len(), dst.len(), "bf16 row length mismatch");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = fp32_to_bf16(s);
    }
}
