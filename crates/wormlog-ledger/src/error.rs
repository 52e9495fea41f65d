use wormlog_crypto::CryptoError;
use wormlog_store::StoreError;
use wormlog_types::TypeError;

/// Errors produced by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed or incomplete input or configuration. Caller-fixable.
    #[error("{0}")]
    Validation(String),

    /// The key (or the chain tail an append was computed against) is taken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Delete blocked by retention or legal hold.
    #[error("record {key} is locked by retention policy")]
    RetentionViolation { key: String },

    /// Chain construction failed.
    #[error("chain error: {0}")]
    Chain(String),

    /// Unclassified storage failure, propagated as is.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(key) => Self::Conflict(format!("key {key} already exists")),
            StoreError::TailMoved { expected, actual } => Self::Conflict(format!(
                "chain tail moved from {} to {}",
                expected.as_deref().unwrap_or("<genesis>"),
                actual.as_deref().unwrap_or("<genesis>"),
            )),
            StoreError::RetentionActive { key } => Self::RetentionViolation { key },
            other => Self::Store(other),
        }
    }
}

impl From<CryptoError> for LedgerError {
    fn from(err: CryptoError) -> Self {
        Self::Chain(err.to_string())
    }
}

impl From<TypeError> for LedgerError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_conflict() {
        let err: LedgerError = StoreError::AlreadyExists("k".into()).into();
        assert!(matches!(err, LedgerError::Conflict(ref m) if m.contains('k')));

        let err: LedgerError = StoreError::TailMoved {
            expected: None,
            actual: Some("b".into()),
        }
        .into();
        assert!(matches!(err, LedgerError::Conflict(ref m) if m.contains("<genesis>")));
    }

    #[test]
    fn retention_maps_to_retention_violation() {
        let err: LedgerError = StoreError::RetentionActive { key: "k".into() }.into();
        assert!(matches!(err, LedgerError::RetentionViolation { ref key } if key == "k"));
    }

    #[test]
    fn transport_failures_stay_opaque() {
        let err: LedgerError = StoreError::Unavailable("poisoned".into()).into();
        assert!(matches!(err, LedgerError::Store(_)));
        assert!(err.to_string().contains("poisoned"));
    }

    #[test]
    fn timestamp_errors_are_validation() {
        let err: LedgerError = TypeError::InvalidTimestamp {
            field: "ts_iso".into(),
            value: "nope".into(),
        }
        .into();
        assert!(matches!(err, LedgerError::Validation(ref m) if m.starts_with("ts_iso")));
    }
}
