use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::LogStored;
use crate::timestamp::iso_millis;

/// Store-level envelope around a stored entry.
///
/// Keys sort lexically in creation order, so iterating a store by key is
/// iterating the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub entry: LogStored,
    #[serde(with = "iso_millis")]
    pub retention_until: DateTime<Utc>,
    pub legal_hold: bool,
    #[serde(with = "iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Returns `true` if neither the retention timer nor a legal hold
    /// protects this record at `now`.
    pub fn is_deletable_at(&self, now: DateTime<Utc>) -> bool {
        !self.legal_hold && now >= self.retention_until
    }
}

/// Range and paging options for listing records.
///
/// `start_key` and `cursor` are exclusive lower bounds, `end_key` is an
/// inclusive upper bound.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_key(mut self, key: impl Into<String>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    pub fn end_key(mut self, key: impl Into<String>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<Record>,
    pub is_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// What a successful append hands back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendResult {
    pub key: String,
    #[serde(with = "iso_millis")]
    pub retention_until: DateTime<Utc>,
    pub entry: LogStored,
}
