//! Log levels of the engine, mapped onto `tracing`.
//!
//! The engine's diagnostics use a small level set that includes a
//! continuation level: a `Cont` message extends the previous message and is
//! emitted at that message's level. Debug prints are additionally gated by a
//! process-wide verbosity (see [`CoreConfig::debug_level`](crate::config::CoreConfig)).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, error, info, trace, warn};

/// Severity of an engine log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogLevel {
    None = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Continue the previous message.
    Cont = 5,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            5 => LogLevel::Cont,
            _ => LogLevel::None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::None => "none",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Cont => "cont",
        };
        f.write_str(s)
    }
}

static LAST_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::None as u8);
static DEBUG_LEVEL: AtomicU8 = AtomicU8::new(0);

/// Resolve `Cont` to the level of the previous message and remember the result.
fn resolve(last: &AtomicU8, level: LogLevel) -> LogLevel {
    if level == LogLevel::Cont {
        LogLevel::from_u8(last.load(Ordering::Relaxed))
    } else {
        last.store(level as u8, Ordering::Relaxed);
        level
    }
}

/// Emit `args` at `level` through `tracing`.
///
/// `None` messages are emitted at trace level.
pub fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    match resolve(&LAST_LEVEL, level) {
        LogLevel::Error => error!(target: "strata_core", "{}", args),
        LogLevel::Warn => warn!(target: "strata_core", "{}", args),
        LogLevel::Info => info!(target: "strata_core", "{}", args),
        LogLevel::Debug => debug!(target: "strata_core", "{}", args),
        LogLevel::None | LogLevel::Cont => trace!(target: "strata_core", "{}", args),
    }
}

/// Set the verbosity used by [`print_debug`].
pub fn set_debug_level(level: u8) {
    DEBUG_LEVEL.store(level, Ordering::Relaxed);
}

pub fn debug_level() -> u8 {
    DEBUG_LEVEL.load(Ordering::Relaxed)
}

/// Whether a debug print of tier `tier` (1, 5 or 10) would be emitted.
pub fn debug_enabled(tier: u8) -> bool {
    tier_enabled(debug_level(), tier)
}

fn tier_enabled(level: u8, tier: u8) -> bool {
    tier > 0 && level >= tier
}

/// Emit a debug message when the configured verbosity reaches `tier`.
pub fn print_debug(tier: u8, args: fmt::Arguments<'_>) {
    if debug_enabled(tier) {
        emit(LogLevel::Debug, args);
    }
}
