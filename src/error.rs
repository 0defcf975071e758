use thiserror::Error;

/// Recoverable failures at the edges of the core.
///
/// Contract violations inside the data structures (an overfull hash set, an
/// oversized op-params write, an out-of-range slot) are programmer errors and
/// panic instead of surfacing here.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidConfig {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid op params: {0}")]
    InvalidOpParams(String),

    #[error("Invalid bit pattern '{0}': expected a 16-bit hex value such as 0x3c00")]
    InvalidBitPattern(String),

    #[error("Unknown numeric format '{0}'. Options: f16, bf16")]
    UnknownFormat(String),
}

/// Convenience result type for fallible core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = CoreError::InvalidConfig {
            key: "STRATA_GRAPH_SIZE".to_string(),
            value: "abc".to_string(),
            reason: "not an integer".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for STRATA_GRAPH_SIZE: 'abc' (not an integer)"
        );
    }

    #[test]
    fn test_unknown_format_message() {
        let err = CoreError::UnknownFormat("f8".to_string());
        assert!(err.to_string().contains("f16, bf16"));
    }
}
