//! Input validation and normalization for appends.

use serde_json::Value;
use wormlog_types::{normalize_iso8601, LogInput, ENTRY_VERSION, SIGNATURE_MEMBER};

use crate::error::{LedgerError, LedgerResult};

/// Decode a caller-supplied JSON body into a [`LogInput`].
///
/// Shape errors (missing members, unknown enum values, wrong JSON types,
/// `null` where a value is required) become [`LedgerError::Validation`].
/// Unknown members are kept and signed with the rest of the entry. A
/// caller-supplied `sig` is discarded.
pub fn parse_input(mut value: Value) -> LedgerResult<LogInput> {
    let Some(body) = value.as_object_mut() else {
        return Err(LedgerError::Validation("entry must be a JSON object".into()));
    };
    if body.get("safe_copy").map_or(true, Value::is_null) {
        return Err(LedgerError::Validation("safe_copy is required".into()));
    }
    body.remove(SIGNATURE_MEMBER);
    serde_json::from_value(value).map_err(|e| LedgerError::Validation(format!("invalid entry: {e}")))
}

/// Validate `input` and rewrite it into the canonical form that is hashed.
///
/// - `ts_iso`, `safe_copy.expires_at` and `worm.retention_until` are
///   re-emitted as UTC millisecond timestamps.
/// - The `safe_copy` strings must be non-empty.
/// - `agent_version`, when present, must be non-empty.
/// - `version` is forced to the current schema version.
pub fn normalize_input(mut input: LogInput) -> LedgerResult<LogInput> {
    input.ts_iso = normalize_iso8601(&input.ts_iso, "ts_iso")?;

    let sc = &mut input.safe_copy;
    if sc.bucket.is_empty() || sc.key.is_empty() || sc.etag.is_empty() {
        return Err(LedgerError::Validation(
            "safe_copy must include bucket, key, etag, and checksum".into(),
        ));
    }
    if sc.checksum.value.is_empty() {
        return Err(LedgerError::Validation(
            "safe_copy.checksum must include algorithm and value".into(),
        ));
    }
    if let Some(expires_at) = &sc.expires_at {
        sc.expires_at = Some(normalize_iso8601(expires_at, "safe_copy.expires_at")?);
    }

    if input.agent_version.as_deref().is_some_and(str::is_empty) {
        return Err(LedgerError::Validation(
            "agent_version cannot be empty when provided".into(),
        ));
    }

    if let Some(worm) = input.worm.as_mut() {
        if let Some(until) = &worm.retention_until {
            worm.retention_until = Some(normalize_iso8601(until, "worm.retention_until")?);
        }
    }

    input.version = Some(ENTRY_VERSION);
    Ok(input)
}
