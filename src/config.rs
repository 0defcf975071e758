//! Runtime configuration read from the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `STRATA_GRAPH_SIZE` | 2048 | node capacity of graphs built with [`ComputationGraph::from_config`](crate::graph::ComputationGraph::from_config) |
//! | `STRATA_DEBUG` | 0 | verbosity of [`print_debug`](crate::log::print_debug) (0, 1, 5 or 10 tiers) |

use tracing::info;

use crate::error::{CoreError, Result};

/// Default node capacity of a computation graph.
pub const DEFAULT_GRAPH_SIZE: usize = 2048;

/// Highest meaningful debug verbosity.
pub const MAX_DEBUG_LEVEL: u8 = 10;

pub const GRAPH_SIZE_ENV: &str = "STRATA_GRAPH_SIZE";
pub const DEBUG_ENV: &str = "STRATA_DEBUG";

/// Process-level settings for the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Node (and leaf) capacity of graphs created from this config.
    pub graph_size: usize,
    /// Debug print verbosity, 0 disables debug prints.
    pub debug_level: u8,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            graph_size: DEFAULT_GRAPH_SIZE,
            debug_level: 0,
        }
    }
}

impl CoreConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value. Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(GRAPH_SIZE_ENV) {
            let size = parse_value::<usize>(GRAPH_SIZE_ENV, &raw)?;
            if size == 0 {
                return Err(invalid(GRAPH_SIZE_ENV, &raw, "must be greater than zero"));
            }
            config.graph_size = size;
        }

        if let Some(raw) = lookup(DEBUG_ENV) {
            let level = parse_value::<u8>(DEBUG_ENV, &raw)?;
            if level > MAX_DEBUG_LEVEL {
                return Err(invalid(DEBUG_ENV, &raw, "must be between 0 and 10"));
            }
            config.debug_level = level;
        }

        info!(
            graph_size = config.graph_size,
            debug_level = config.debug_level,
            "core config loaded"
        );
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> CoreError {
    CoreError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
