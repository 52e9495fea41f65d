use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Schema version stamped on every stored entry.
pub const ENTRY_VERSION: u8 = 1;

/// What the file-handling pipeline decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allowed,
    Blocked,
    SafeCopied,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed => write!(f, "allowed"),
            Self::Blocked => write!(f, "blocked"),
            Self::SafeCopied => write!(f, "safe_copied"),
        }
    }
}

/// Checksum algorithms accepted for safe-copy objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Crc32c,
    Crc64nvme,
}

impl ChecksumAlgorithm {
    pub const ALL: [Self; 4] = [Self::Sha256, Self::Sha1, Self::Crc32c, Self::Crc64nvme];
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha1 => write!(f, "sha1"),
            Self::Crc32c => write!(f, "crc32c"),
            Self::Crc64nvme => write!(f, "crc64nvme"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Location and integrity data of the sanitized copy written by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeCopyMetadata {
    pub bucket: String,
    pub key: String,
    pub etag: String,
    pub checksum: Checksum,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Retention request attached to an entry.
///
/// On input both members are optional. After normalization the service
/// always fills both in, so the stored entry records the effective policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WormMetadata {
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub retention_until: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub legal_hold: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A ledger entry as supplied by the caller.
///
/// The typed form is lossless, since the content hash is computed over its
/// serialization:
///
/// - absent optional members stay absent;
/// - `reason` may be an explicit `null`, which is kept (`Some(None)`);
/// - `null` is rejected for every other optional member;
/// - members without a field of their own are kept verbatim in `extra`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogInput {
    pub ts_iso: String,
    pub session_id: String,
    pub actor: String,
    pub url_sha256: String,
    pub result: Outcome,
    pub safe_copy: SafeCopyMetadata,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub asn: Option<Number>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub mime_detected: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<Number>,
    #[serde(default, deserialize_with = "keep_null", skip_serializing_if = "Option::is_none")]
    pub reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub dpi: Option<Number>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub pages: Option<Number>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<Number>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub worm: Option<WormMetadata>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A present member must not be `null`. Absence is handled by `default`.
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A present `null` becomes `Some(None)`.
fn keep_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Member of a stored entry that holds its [`Signature`].
pub const SIGNATURE_MEMBER: &str = "sig";

/// Chain link of a stored entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Content hash of the previous entry; `None` (JSON `null`) for genesis.
    pub prev_hash: Option<String>,
    /// HMAC-SHA256 over `prev_hash` and this entry's content hash.
    pub hmac: String,
}

/// A normalized entry together with its chain signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStored {
    #[serde(flatten)]
    pub entry: LogInput,
    pub sig: Signature,
}

impl LogStored {
    pub fn new(mut entry: LogInput, sig: Signature) -> Self {
        entry.extra.remove(SIGNATURE_MEMBER);
        Self { entry, sig }
    }

    /// The signed content, i.e. everything except `sig`.
    pub fn without_signature(&self) -> &LogInput {
        &self.entry
    }
}
