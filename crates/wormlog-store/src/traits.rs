use async_trait::async_trait;
use wormlog_types::{ListOptions, ListPage, Record};

use crate::error::StoreResult;

/// Page size used when scanning for the chain tail.
pub const TAIL_PAGE_SIZE: usize = 100;

/// Ordered, append-once record store.
///
/// All implementations must satisfy these invariants:
/// - `append` fails with [`StoreError::AlreadyExists`] if the key exists and
///   leaves the stored record untouched; otherwise the record is durable
///   when the call returns.
/// - `list` yields records with keys strictly greater than `start_key` (or
///   `cursor`) and at most `end_key`, ascending, capped at `limit`.
/// - `delete` fails with [`StoreError::RetentionActive`] while
///   `now < retention_until` or `legal_hold` is set; deleting an absent key
///   succeeds.
/// - Reads are safe to run concurrently with each other and with appends.
///
/// [`StoreError::AlreadyExists`]: crate::StoreError::AlreadyExists
/// [`StoreError::RetentionActive`]: crate::StoreError::RetentionActive
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a new record.
    async fn append(&self, record: &Record) -> StoreResult<()>;

    /// Point lookup. Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str) -> StoreResult<Option<Record>>;

    /// One page of records in key order.
    async fn list(&self, options: &ListOptions) -> StoreResult<ListPage>;

    /// Remove a record whose retention has lapsed.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// The last record in key order, or `None` for an empty store.
    ///
    /// Default implementation walks every page of `list` and keeps the last
    /// item of the last page. Backends with cheaper access override it.
    async fn tail(&self) -> StoreResult<Option<Record>> {
        let mut options = ListOptions::new().limit(TAIL_PAGE_SIZE);
        let mut latest = None;
        loop {
            let page = self.list(&options).await?;
            if let Some(last) = page.items.into_iter().last() {
                latest = Some(last);
            }
            if !page.is_truncated {
                break;
            }
            match page.cursor {
                Some(cursor) => options.cursor = Some(cursor),
                None => break,
            }
        }
        Ok(latest)
    }

    /// Append `record` only if the current tail key is `expected_tail`.
    ///
    /// Backends that can check and write under one critical section return
    /// [`StoreError::TailMoved`] when the tail changed. The default has no
    /// such primitive and simply appends: callers sharing one object store
    /// across processes still need an external lease.
    ///
    /// [`StoreError::TailMoved`]: crate::StoreError::TailMoved
    async fn append_after(&self, record: &Record, expected_tail: Option<&str>) -> StoreResult<()> {
        let _ = expected_tail;
        self.append(record).await
    }
}
