/// Errors from hashing and signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid chain key: {0}")]
    InvalidKey(String),
}
