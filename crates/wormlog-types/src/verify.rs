use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a record failed chain verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffReason {
    /// The stored `prev_hash` is not the content hash of the preceding record.
    MissingPrev,
    /// Reserved; the current verification algorithm never emits it.
    HashMismatch,
    /// The stored HMAC does not match the one recomputed from the content.
    HmacMismatch,
}

impl fmt::Display for DiffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPrev => write!(f, "missing-prev"),
            Self::HashMismatch => write!(f, "hash-mismatch"),
            Self::HmacMismatch => write!(f, "hmac-mismatch"),
        }
    }
}

/// A single discontinuity found while verifying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDiff {
    pub key: String,
    pub reason: DiffReason,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Range to verify. `start_key` is exclusive, `end_key` inclusive, and
/// `limit` is the page size used while walking the store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub valid: bool,
    pub checked: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<String>,
    pub diffs: Vec<ChainDiff>,
}
