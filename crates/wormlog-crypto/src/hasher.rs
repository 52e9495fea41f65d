use serde::Serialize;
use sha2::{Digest, Sha256};
use wormlog_types::{LogInput, LogStored};

use crate::canonical::canonical_entry_payload;
use crate::error::CryptoError;

/// SHA-256 content hasher over canonical entry payloads.
///
/// Hashes are lowercase 64-character hex strings, the form in which they
/// are embedded in `sig.prev_hash`.
pub struct ContentHasher;

impl ContentHasher {
    /// Hex SHA-256 of raw bytes.
    pub fn hash_bytes(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Hash an already-decoded JSON entry. A top-level `sig` is ignored.
    pub fn hash_value(entry: &serde_json::Value) -> String {
        Self::hash_bytes(canonical_entry_payload(entry).as_bytes())
    }

    /// Hash any serializable entry through its canonical JSON form.
    pub fn hash_json<T: Serialize>(entry: &T) -> Result<String, CryptoError> {
        let value =
            serde_json::to_value(entry).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(Self::hash_value(&value))
    }

    /// Content hash of an unsigned entry.
    pub fn hash_input(entry: &LogInput) -> Result<String, CryptoError> {
        Self::hash_json(entry)
    }

    /// Content hash of a stored entry, computed over everything but `sig`.
    pub fn hash_stored(entry: &LogStored) -> Result<String, CryptoError> {
        Self::hash_json(entry.without_signature())
    }
}
