pub mod alloc;
pub mod bitset;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod hash_set;
pub mod log;
pub mod numeric;
pub mod op_params;

pub use bitset::BitSet;
pub use config::CoreConfig;
pub use error::CoreError;
pub use graph::{ComputationGraph, EvalOrder, GraphView, NodeId, NodeIdAllocator};
pub use hash_set::{hash_size, IdentityHashSet, IdentityKey};
pub use numeric::{Bf16, Fp16};
pub use op_params::{HasOpParams, OpParams, ParamValue, MAX_OP_PARAMS};

/// Prepare process-wide state: apply `config`'s debug level and build the
/// fp16 decode table. Call once at startup, before spawning workers.
pub fn init(config: &CoreConfig) {
    log::set_debug_level(config.debug_level);
    numeric::init();
    tracing::debug!(graph_size = config.graph_size, "strata-core initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_builds_fp16_table() {
        init(&CoreConfig::default());
        assert!(numeric::is_initialized());
        assert_eq!(numeric::fp16_to_fp32(Fp16::ONE), 1.0);
    }
}
