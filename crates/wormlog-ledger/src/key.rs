use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Extension of every record key.
pub const KEY_EXTENSION: &str = "json";

/// Derive a record key from the entry timestamp.
///
/// Layout: `YYYY/MM/DD/HHMMSSmmm_<uuid-v7>.json`. Keys sort lexically by
/// timestamp (to the millisecond). The v7 suffix is time-ordered and
/// monotonic within the process, so entries sharing a millisecond sort in
/// the order they were derived.
pub fn derive_key(ts: &DateTime<Utc>) -> String {
    derive_key_with(ts, Uuid::now_v7())
}

/// Derive a key for `ts` that sorts after `tail` whenever both fall in the
/// same millisecond.
///
/// Must be called while holding the append lock, with `tail` being the
/// current last key. A `ts` older than the tail's millisecond still yields
/// a key before the tail.
pub fn derive_key_after(ts: &DateTime<Utc>, tail: Option<&str>) -> String {
    let key = derive_key(ts);
    let Some(tail) = tail else {
        return key;
    };
    if key.as_str() > tail {
        return key;
    }
    match tail_suffix(ts, tail) {
        Some(last) => derive_key_with(ts, Uuid::from_u128(last.as_u128().wrapping_add(1))),
        None => key,
    }
}

/// The UUID suffix of `tail` if it shares the millisecond prefix of `ts`.
fn tail_suffix(ts: &DateTime<Utc>, tail: &str) -> Option<Uuid> {
    let prefix = format!("{}_", ts.format("%Y/%m/%d/%H%M%S%3f"));
    let suffix = tail
        .strip_prefix(prefix.as_str())?
        .strip_suffix(KEY_EXTENSION)?
        .strip_suffix('.')?;
    Uuid::try_parse(suffix).ok()
}

pub(crate) fn derive_key_with(ts: &DateTime<Utc>, id: Uuid) -> String {
    format!(
        "{}_{}.{KEY_EXTENSION}",
        ts.format("%Y/%m/%d/%H%M%S%3f"),
        id.as_hyphenated()
    )
}
