use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("{field} must be an ISO8601 timestamp, got {value:?}")]
    InvalidTimestamp { field: String, value: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
