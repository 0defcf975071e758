//! Aligned memory for tensor buffers.
//!
//! Tensor data is laid out on [`TENSOR_ALIGNMENT`]-byte boundaries, the
//! minimum GGUF guarantees for memory-mapped tensor data. Every block obtained
//! from [`aligned_alloc`] must be returned through [`aligned_free`] with the
//! same size; [`AlignedBuffer`] pairs the two automatically.

use std::alloc::Layout;
use std::ptr::NonNull;

use tracing::{error, warn};

/// Alignment in bytes of every tensor buffer.
pub const TENSOR_ALIGNMENT: usize = 32;

/// Round `n` up to a multiple of 32.
#[inline]
pub const fn up32(n: usize) -> usize {
    (n + 31) & !31
}

/// Round `n` up to a multiple of `m`.
///
/// # Panics
/// Panics if `m` is not a power of two.
#[inline]
pub fn align_up(n: usize, m: usize) -> usize {
    assert!(m.is_power_of_two(), "alignment {} is not a power of two", m);
    (n + m - 1) & !(m - 1)
}

fn tensor_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size, TENSOR_ALIGNMENT).ok()
}

/// Allocate `size` bytes aligned to [`TENSOR_ALIGNMENT`].
///
/// Returns `None` for zero-sized requests and when the allocator fails; the
/// failure is logged.
pub fn aligned_alloc(size: usize) -> Option<NonNull<u8>> {
    if size == 0 {
        warn!("behavior may be unexpected when allocating 0 bytes for aligned_alloc");
        return None;
    }
    let Some(layout) = tensor_layout(size) else {
        error!(size, "invalid aligned allocation size");
        return None;
    };
    // SAFETY: `layout` has a non-zero size.
    let ptr = unsafe { std::alloc::alloc(layout) };
    let ptr = NonNull::new(ptr);
    if ptr.is_none() {
        error!(
            size_mb = size as f64 / (1024.0 * 1024.0),
            "failed to allocate aligned buffer"
        );
    }
    ptr
}

/// Release a block obtained from [`aligned_alloc`].
///
/// # Safety
/// `ptr` must come from `aligned_alloc(size)` with this exact `size`, and must
/// not be used or released again afterwards.
pub unsafe fn aligned_free(ptr: NonNull<u8>, size: usize) {
    if let Some(layout) = tensor_layout(size) {
        std::alloc::dealloc(ptr.as_ptr(), layout);
    }
}

/// Owned, zero-initialized, [`TENSOR_ALIGNMENT`]-aligned byte buffer.
///
/// Released with its original size when dropped.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// The buffer owns its allocation exclusively.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate a zeroed buffer of `len` bytes.
    ///
    /// Returns `None` when `len` is zero or the allocation fails.
    pub fn new(len: usize) -> Option<Self> {
        let ptr = aligned_alloc(len)?;
        // SAFETY: `ptr` is valid for writes of `len` bytes.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        Some(Self { ptr, len })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the block is initialized and valid for `len` bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the block is initialized, valid for `len` bytes and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `aligned_alloc(self.len)` and is released once.
        unsafe { aligned_free(self.ptr, self.len) };
    }
}
