use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use wormlog_types::{ListOptions, ListPage, Record};

use crate::error::{StoreError, StoreResult};
use crate::traits::LedgerStore;

/// In-memory, `BTreeMap`-based record store.
///
/// Intended for tests and non-durable deployments. Records live in a sorted
/// key space behind a `RwLock`, so iteration order is chain order and the
/// tail is the last map entry.
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, Record>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Drop every record, retention notwithstanding. Test-only escape hatch.
    pub fn reset(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Mutate a stored record in place, bypassing append-once.
    ///
    /// Returns `false` if the key does not exist.
    #[cfg(any(test, feature = "test-util"))]
    pub fn tamper<F: FnOnce(&mut Record)>(&self, key: &str, f: F) -> bool {
        let mut map = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match map.get_mut(key) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<String, Record>>> {
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable("record map lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<String, Record>>> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("record map lock poisoned".into()))
    }

    fn insert_new(map: &mut BTreeMap<String, Record>, record: &Record) -> StoreResult<()> {
        if map.contains_key(&record.key) {
            return Err(StoreError::AlreadyExists(record.key.clone()));
        }
        map.insert(record.key.clone(), record.clone());
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn append(&self, record: &Record) -> StoreResult<()> {
        let mut map = self.write()?;
        Self::insert_new(&mut map, record)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Record>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn list(&self, options: &ListOptions) -> StoreResult<ListPage> {
        let map = self.read()?;
        let after = options.cursor.as_deref().or(options.start_key.as_deref());
        let end = options.end_key.as_deref();

        if let (Some(after), Some(end)) = (after, end) {
            if after >= end {
                return Ok(ListPage {
                    items: Vec::new(),
                    is_truncated: false,
                    cursor: Some(after.to_string()),
                });
            }
        }

        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        let upper = end.map_or(Bound::Unbounded, Bound::Included);
        let mut range = map.range::<str, _>((lower, upper));

        let limit = options.limit.map(|l| l.max(1)).unwrap_or(usize::MAX);
        let items: Vec<Record> = range.by_ref().take(limit).map(|(_, r)| r.clone()).collect();
        let is_truncated = range.next().is_some();
        let cursor = items
            .last()
            .map(|r| r.key.clone())
            .or_else(|| after.map(str::to_string));

        Ok(ListPage {
            items,
            is_truncated,
            cursor,
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut map = self.write()?;
        let Some(record) = map.get(key) else {
            return Ok(());
        };
        if !record.is_deletable_at(Utc::now()) {
            tracing::warn!(key, legal_hold = record.legal_hold, "delete refused by retention");
            return Err(StoreError::RetentionActive {
                key: key.to_string(),
            });
        }
        map.remove(key);
        Ok(())
    }

    async fn tail(&self) -> StoreResult<Option<Record>> {
        Ok(self.read()?.values().next_back().cloned())
    }

    async fn append_after(&self, record: &Record, expected_tail: Option<&str>) -> StoreResult<()> {
        let mut map = self.write()?;
        let actual = map.keys().next_back().map(String::as_str);
        if actual != expected_tail {
            return Err(StoreError::TailMoved {
                expected: expected_tail.map(str::to_string),
                actual: actual.map(str::to_string),
            });
        }
        Self::insert_new(&mut map, record)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("record_count", &self.len())
            .finish()
    }
}
