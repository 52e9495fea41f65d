/// Errors from ledger store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this key already exists.
    #[error("object {0} already exists")]
    AlreadyExists(String),

    /// A conditional append found a different chain tail than expected.
    #[error("chain tail moved: expected {expected:?}, found {actual:?}")]
    TailMoved {
        expected: Option<String>,
        actual: Option<String>,
    },

    /// Delete refused by retention or legal hold.
    #[error("object {key} is immutable during retention/legal hold")]
    RetentionActive { key: String },

    /// The stored bytes could not be decoded into a record.
    #[error("corrupt object {key}: {reason}")]
    CorruptObject { key: String, reason: String },

    /// The backend answered with a status this client does not handle.
    #[error("{operation} failed with status {status}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Network or protocol failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend was constructed with unusable settings.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// In-process state is unusable (poisoned lock).
    #[error("store state unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` for append-once violations.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::TailMoved { .. })
    }

    /// Returns `true` for WORM refusals.
    pub fn is_retention(&self) -> bool {
        matches!(self, Self::RetentionActive { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
