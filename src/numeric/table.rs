//! Process-wide fp16 decode table.

use std::sync::OnceLock;

use tracing::debug;

use super::hw;

/// Number of distinct fp16 bit patterns.
pub const TABLE_LEN: usize = 1 << 16;

static TABLE: OnceLock<Box<[f32]>> = OnceLock::new();

fn build() -> Box<[f32]> {
    let table: Box<[f32]> = (0..=u16::MAX).map(hw::fp16_to_fp32).collect();
    debug!(entries = table.len(), backend = hw::BACKEND, "Built fp16 decode table");
    table
}

/// The decode table, built on first use.
pub fn table() -> &'static [f32] {
    TABLE.get_or_init(build)
}

/// Build the table if no thread has done so yet.
pub fn init() {
    table();
}

pub fn is_initialized() -> bool {
    TABLE.get().is_some()
}

#[inline]
pub fn lookup(h: u16) -> f32 {
    table()[h as usize]
}
