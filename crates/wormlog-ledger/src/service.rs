use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use wormlog_crypto::{ChainSigner, ContentHasher};
use wormlog_store::traits::TAIL_PAGE_SIZE;
use wormlog_store::{InMemoryStore, LedgerStore, ObjectLockStore};
use wormlog_types::{
    format_iso8601, parse_iso8601, AppendResult, ChainDiff, DiffReason, ListOptions, ListPage,
    LogInput, LogStored, Record, Signature, VerifyRange, VerifyResult, WormMetadata,
};

use crate::config::{LedgerConfig, RetentionPolicy, StoreConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::key::derive_key_after;
use crate::validation::normalize_input;

/// Page size used by `verify` when the range does not set one.
pub const DEFAULT_VERIFY_PAGE_SIZE: usize = 1000;

/// Entry point for appending to, reading, and verifying the ledger.
///
/// Appends from one service instance are serialized: no two of them read
/// the same chain tail. Several processes writing to one object store
/// still need an external lease.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    signer: ChainSigner,
    policy: RetentionPolicy,
    append_lock: Mutex<()>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, signer: ChainSigner, policy: RetentionPolicy) -> Self {
        Self {
            store,
            signer,
            policy,
            append_lock: Mutex::new(()),
        }
    }

    /// Build the store named by `config` and a service on top of it.
    pub fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        let store: Arc<dyn LedgerStore> = match &config.store {
            StoreConfig::Memory => Arc::new(InMemoryStore::new()),
            StoreConfig::ObjectLock(cfg) => Arc::new(
                ObjectLockStore::new(cfg.clone())
                    .map_err(|e| LedgerError::Validation(e.to_string()))?,
            ),
        };
        let signer = ChainSigner::new(config.chain_secret.as_bytes())?;
        tracing::info!(
            backend = match config.store {
                StoreConfig::Memory => "memory",
                StoreConfig::ObjectLock(_) => "object-lock",
            },
            retention_days = config.policy.retention_days,
            legal_hold_default = config.policy.legal_hold_default,
            "ledger service configured"
        );
        Ok(Self::new(store, signer, config.policy))
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Validate, sign and persist one entry.
    pub async fn append(&self, input: LogInput) -> LedgerResult<AppendResult> {
        let mut entry = normalize_input(input)?;
        let ts = parse_iso8601(&entry.ts_iso)
            .ok_or_else(|| LedgerError::Validation("ts_iso must be an ISO8601 timestamp".into()))?;

        let requested = entry.worm.take().unwrap_or_default();
        let retention_until = match requested.retention_until.as_deref() {
            Some(until) => parse_iso8601(until).ok_or_else(|| {
                LedgerError::Validation("worm.retention_until must be an ISO8601 timestamp".into())
            })?,
            None => ts
                .checked_add_signed(Duration::days(i64::from(self.policy.retention_days)))
                .ok_or_else(|| LedgerError::Validation("retention_until is out of range".into()))?,
        };
        let legal_hold = requested.legal_hold.unwrap_or(self.policy.legal_hold_default);
        entry.worm = Some(WormMetadata {
            retention_until: Some(format_iso8601(&retention_until)),
            legal_hold: Some(legal_hold),
            ..WormMetadata::default()
        });

        let content_hash = ContentHasher::hash_input(&entry)?;

        let _guard = self.append_lock.lock().await;
        let tail = self.store.tail().await?;
        let key = derive_key_after(&ts, tail.as_ref().map(|prev| prev.key.as_str()));
        let prev_hash = match &tail {
            Some(prev) => Some(ContentHasher::hash_stored(&prev.entry)?),
            None => None,
        };
        if let Some(prev) = tail.as_ref().filter(|prev| key < prev.key) {
            tracing::warn!(
                key = %key,
                tail = %prev.key,
                "entry timestamp precedes chain tail; key order will not match chain order"
            );
        }

        let hmac = self.signer.tag(prev_hash.as_deref(), &content_hash);
        let record = Record {
            key,
            entry: LogStored::new(entry, Signature { prev_hash, hmac }),
            retention_until,
            legal_hold,
            created_at: Utc::now(),
        };
        self.store
            .append_after(&record, tail.as_ref().map(|prev| prev.key.as_str()))
            .await?;

        tracing::info!(
            key = %record.key,
            retention_until = %format_iso8601(&record.retention_until),
            legal_hold,
            genesis = record.entry.sig.prev_hash.is_none(),
            "appended audit entry"
        );
        Ok(AppendResult {
            key: record.key,
            retention_until: record.retention_until,
            entry: record.entry,
        })
    }

    pub async fn get(&self, key: &str) -> LedgerResult<Option<Record>> {
        Ok(self.store.get(key).await?)
    }

    pub async fn list(&self, options: &ListOptions) -> LedgerResult<ListPage> {
        Ok(self.store.list(options).await?)
    }

    /// Delete a record whose retention has lapsed. Absent keys are a no-op.
    pub async fn delete(&self, key: &str) -> LedgerResult<()> {
        match self.store.delete(key).await {
            Ok(()) => {
                tracing::info!(key, "deleted audit entry");
                Ok(())
            }
            Err(e) => {
                let err = LedgerError::from(e);
                if let LedgerError::RetentionViolation { .. } = err {
                    tracing::warn!(key, "delete refused by retention policy");
                }
                Err(err)
            }
        }
    }

    /// Recompute the chain over `range` and report every discontinuity.
    ///
    /// Records are walked in key order after `start_key` up to and
    /// including `end_key`. The expected `prev_hash` of each record is the
    /// recomputed content hash of the record before it, never the stored
    /// `prev_hash`, so one tampered record cannot mask later breaks.
    pub async fn verify(&self, range: &VerifyRange) -> LedgerResult<VerifyResult> {
        let page_size = range.limit.unwrap_or(DEFAULT_VERIFY_PAGE_SIZE).max(1);
        let mut expected_prev = match &range.start_key {
            Some(start) => self.seed_hash(start).await?,
            None => None,
        };

        let mut diffs = Vec::new();
        let mut checked: u64 = 0;
        let mut first_key: Option<String> = None;
        let mut last_key: Option<String> = None;
        let mut options = ListOptions {
            start_key: range.start_key.clone(),
            end_key: range.end_key.clone(),
            cursor: None,
            limit: Some(page_size),
        };

        'pages: loop {
            let page = self.store.list(&options).await?;
            if page.items.is_empty() {
                break;
            }
            for record in &page.items {
                let content_hash = ContentHasher::hash_stored(&record.entry)?;
                let sig = &record.entry.sig;

                if sig.prev_hash != expected_prev {
                    diffs.push(ChainDiff {
                        key: record.key.clone(),
                        reason: DiffReason::MissingPrev,
                        expected: expected_prev.clone(),
                        actual: sig.prev_hash.clone(),
                    });
                }
                if !self.signer.verify(sig.prev_hash.as_deref(), &content_hash, &sig.hmac) {
                    diffs.push(ChainDiff {
                        key: record.key.clone(),
                        reason: DiffReason::HmacMismatch,
                        expected: Some(self.signer.tag(sig.prev_hash.as_deref(), &content_hash)),
                        actual: Some(sig.hmac.clone()),
                    });
                }

                expected_prev = Some(content_hash);
                checked += 1;
                if first_key.is_none() {
                    first_key = Some(record.key.clone());
                }
                last_key = Some(record.key.clone());
                if range.end_key.as_deref() == Some(record.key.as_str()) {
                    break 'pages;
                }
            }
            if !page.is_truncated {
                break;
            }
            match page.cursor {
                Some(cursor) => options.cursor = Some(cursor),
                None => break,
            }
        }

        for diff in &diffs {
            tracing::warn!(key = %diff.key, reason = %diff.reason, "chain discontinuity");
        }
        tracing::info!(checked, diffs = diffs.len(), "verified audit chain");

        Ok(VerifyResult {
            valid: diffs.is_empty(),
            checked,
            range_start: range.start_key.clone().or(first_key),
            range_end: last_key,
            diffs,
        })
    }

    /// Content hash of the record with the greatest key at or before `key`.
    async fn seed_hash(&self, key: &str) -> LedgerResult<Option<String>> {
        let seed = match self.store.get(key).await? {
            Some(record) => Some(record),
            None => self.last_at_or_before(key).await?,
        };
        match seed {
            Some(record) => Ok(Some(ContentHasher::hash_stored(&record.entry)?)),
            None => Ok(None),
        }
    }

    async fn last_at_or_before(&self, key: &str) -> LedgerResult<Option<Record>> {
        let mut options = ListOptions::new().end_key(key).limit(TAIL_PAGE_SIZE);
        let mut latest = None;
        loop {
            let page = self.store.list(&options).await?;
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
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("signer", &self.signer)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wormlog_types::Outcome;

    use crate::validation::parse_input;

    const SECRET: &str = "test-secret-key";

    fn service_with_policy(policy: RetentionPolicy) -> (LedgerService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let service = LedgerService::new(store.clone(), ChainSigner::new(SECRET).unwrap(), policy);
        (service, store)
    }

    fn service() -> (LedgerService, Arc<InMemoryStore>) {
        service_with_policy(RetentionPolicy::default())
    }

    fn body(ts: &str) -> Value {
        json!({
            "ts_iso": ts,
            "session_id": "session-1",
            "actor": "pipeline@example.com",
            "url_sha256": "cd".repeat(32),
            "result": "safe_copied",
            "safe_copy": {
                "bucket": "safe-copies",
                "key": "copies/report.pdf",
                "etag": "\"9b2cf535f27731c974343645a3985328\"",
                "checksum": {"algorithm": "sha256", "value": "q1w2e3"}
            },
            "size_bytes": 1024,
            "mime_detected": "application/pdf"
        })
    }

    fn input(ts: &str) -> LogInput {
        parse_input(body(ts)).unwrap()
    }

    #[tokio::test]
    async fn genesis_has_null_prev_hash() {
        let (svc, _) = service();
        let result = svc.append(input("2024-01-01T00:00:00Z")).await.unwrap();
        assert!(result.entry.sig.prev_hash.is_none());
        assert_eq!(result.entry.entry.version, Some(1));
        assert_eq!(result.entry.entry.result, Outcome::SafeCopied);
    }

    #[tokio::test]
    async fn second_entry_links_to_first_content_hash() {
        let (svc, _) = service();
        let a = svc.append(input("2024-01-01T00:00:00Z")).await.unwrap();
        let b = svc.append(input("2024-01-01T00:00:01Z")).await.unwrap();
        let expected = ContentHasher::hash_stored(&a.entry).unwrap();
        assert_eq!(b.entry.sig.prev_hash.as_deref(), Some(expected.as_str()));

        let signer = ChainSigner::new(SECRET).unwrap();
        let content = ContentHasher::hash_stored(&b.entry).unwrap();
        assert!(signer.verify(Some(&expected), &content, &b.entry.sig.hmac));
    }

    #[tokio::test]
    async fn retention_derives_from_timestamp_and_policy() {
        let (svc, store) = service();
        let result = svc.append(input("2024-01-01T00:00:00Z")).await.unwrap();
        assert_eq!(format_iso8601(&result.retention_until), "2024-03-31T00:00:00.000Z");

        let worm = result.entry.entry.worm.clone().unwrap();
        assert_eq!(worm.retention_until.as_deref(), Some("2024-03-31T00:00:00.000Z"));
        assert_eq!(worm.legal_hold, Some(false));

        let record = store.get(&result.key).await.unwrap().unwrap();
        assert_eq!(record.retention_until, result.retention_until);
        assert!(!record.legal_hold);
    }

    #[tokio::test]
    async fn caller_worm_overrides_policy() {
        let (svc, _) = service();
        let mut value = body("2024-01-01T00:00:00Z");
        value["worm"] = json!({"retention_until": "2025-06-01", "legal_hold": true});
        let result = svc.append(parse_input(value).unwrap()).await.unwrap();
        assert_eq!(format_iso8601(&result.retention_until), "2025-06-01T00:00:00.000Z");
        assert_eq!(result.entry.entry.worm.unwrap().legal_hold, Some(true));
    }

    #[tokio::test]
    async fn legal_hold_default_applies() {
        let (svc, store) = service_with_policy(RetentionPolicy {
            retention_days: 1,
            legal_hold_default: true,
        });
        let result = svc.append(input("2000-01-01T00:00:00Z")).await.unwrap();
        assert!(store.get(&result.key).await.unwrap().unwrap().legal_hold);
        let err = svc.delete(&result.key).await.unwrap_err();
        assert!(matches!(err, LedgerError::RetentionViolation { .. }));
    }

    #[tokio::test]
    async fn key_reflects_timestamp() {
        let (svc, _) = service();
        let result = svc.append(input("2024-02-03T04:05:06.789Z")).await.unwrap();
        assert!(result.key.starts_with("2024/02/03/040506789_"), "{}", result.key);
        assert!(result.key.ends_with(".json"));
    }

    #[tokio::test]
    async fn validation_failure_writes_nothing() {
        let (svc, store) = service();
        let mut value = body("2024-01-01T00:00:00Z");
        value["safe_copy"]["etag"] = json!("");
        let err = svc.append(parse_input(value).unwrap()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn verify_empty_store_is_valid() {
        let (svc, _) = service();
        let result = svc.verify(&VerifyRange::default()).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.checked, 0);
        assert!(result.range_start.is_none());
        assert!(result.range_end.is_none());
    }

    #[tokio::test]
    async fn verify_intact_chain_across_pages() {
        let (svc, _) = service();
        let mut keys = Vec::new();
        for i in 0..7 {
            let ts = format!("2024-01-01T00:00:{i:02}Z");
            keys.push(svc.append(input(&ts)).await.unwrap().key);
        }
        let result = svc
            .verify(&VerifyRange {
                limit: Some(2),
                ..VerifyRange::default()
            })
            .await
            .unwrap();
        assert!(result.valid, "{:?}", result.diffs);
        assert_eq!(result.checked, 7);
        assert_eq!(result.range_start.as_deref(), Some(keys[0].as_str()));
        assert_eq!(result.range_end.as_deref(), Some(keys[6].as_str()));
    }

    #[tokio::test]
    async fn tampered_field_reports_hmac_mismatch_only_at_that_key() {
        let (svc, store) = service();
        let a = svc.append(input("2024-01-01T00:00:00Z")).await.unwrap();
        let b = svc.append(input("2024-01-01T00:00:01Z")).await.unwrap();

        assert!(store.tamper(&b.key, |r| r.entry.entry.size_bytes = Some(999_999u64.into())));
        let result = svc.verify(&VerifyRange::default()).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.checked, 2);
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].key, b.key);
        assert_eq!(result.diffs[0].reason, DiffReason::HmacMismatch);
        assert_eq!(result.diffs[0].actual.as_deref(), Some(b.entry.sig.hmac.as_str()));
        assert_ne!(result.diffs[0].key, a.key);
    }

    #[tokio::test]
    async fn tampering_mid_chain_also_breaks_the_next_link() {
        let (svc, store) = service();
        let mut keys = Vec::new();
        for i in 0..3 {
            let ts = format!("2024-01-01T00:00:0{i}Z");
            keys.push(svc.append(input(&ts)).await.unwrap().key);
        }
        store.tamper(&keys[1], |r| r.entry.entry.actor = "mallory".into());

        let result = svc.verify(&VerifyRange::default()).await.unwrap();
        let found: Vec<(&str, DiffReason)> = result
            .diffs
            .iter()
            .map(|d| (d.key.as_str(), d.reason))
            .collect();
        assert_eq!(
            found,
            [
                (keys[1].as_str(), DiffReason::HmacMismatch),
                (keys[2].as_str(), DiffReason::MissingPrev),
            ]
        );
    }

    #[tokio::test]
    async fn deleted_record_shows_as_missing_prev() {
        let (svc, store) = service();
        let mut keys = Vec::new();
        for i in 0..3 {
            let ts = format!("2024-01-01T00:00:0{i}Z");
            keys.push(svc.append(input(&ts)).await.unwrap().key);
        }
        store.tamper(&keys[1], |r| {
            r.retention_until = Utc::now() - Duration::days(1);
        });
        svc.delete(&keys[1]).await.unwrap();

        let result = svc.verify(&VerifyRange::default()).await.unwrap();
        assert_eq!(result.checked, 2);
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].key, keys[2]);
        assert_eq!(result.diffs[0].reason, DiffReason::MissingPrev);
    }

    #[tokio::test]
    async fn ranged_verify_seeds_from_start_key() {
        let (svc, _) = service();
        let mut keys = Vec::new();
        for i in 0..5 {
            let ts = format!("2024-01-01T00:00:0{i}Z");
            keys.push(svc.append(input(&ts)).await.unwrap().key);
        }
        let result = svc
            .verify(&VerifyRange {
                start_key: Some(keys[1].clone()),
                end_key: Some(keys[3].clone()),
                limit: Some(1),
            })
            .await
            .unwrap();
        assert!(result.valid, "{:?}", result.diffs);
        assert_eq!(result.checked, 2);
        assert_eq!(result.range_start.as_deref(), Some(keys[1].as_str()));
        assert_eq!(result.range_end.as_deref(), Some(keys[3].as_str()));
    }

    #[tokio::test]
    async fn ranged_verify_with_absent_start_key_seeds_from_predecessor() {
        let (svc, _) = service();
        let mut keys = Vec::new();
        for i in 0..3 {
            let ts = format!("2024-01-01T00:00:0{i}Z");
            keys.push(svc.append(input(&ts)).await.unwrap().key);
        }
        // Sorts after keys[0] and before keys[1].
        let between = format!("{}~", keys[0]);
        let result = svc
            .verify(&VerifyRange {
                start_key: Some(between.clone()),
                ..VerifyRange::default()
            })
            .await
            .unwrap();
        assert!(result.valid, "{:?}", result.diffs);
        assert_eq!(result.checked, 2);
        assert_eq!(result.range_start.as_deref(), Some(between.as_str()));
    }

    #[tokio::test]
    async fn delete_within_retention_is_refused() {
        let (svc, store) = service();
        let a = svc.append(input(&format_iso8601(&Utc::now()))).await.unwrap();
        let err = svc.delete(&a.key).await.unwrap_err();
        assert!(matches!(err, LedgerError::RetentionViolation { ref key } if key == &a.key));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn delete_after_retention_then_get_is_none() {
        let (svc, _) = service_with_policy(RetentionPolicy {
            retention_days: 1,
            legal_hold_default: false,
        });
        let a = svc.append(input("2000-01-01T00:00:00Z")).await.unwrap();
        svc.delete(&a.key).await.unwrap();
        assert!(svc.get(&a.key).await.unwrap().is_none());
        svc.delete(&a.key).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_never_race_the_tail() {
        let (svc, store) = service();
        let svc = Arc::new(svc);
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move {
                    let mut value = body("2024-01-01T00:00:00Z");
                    value["session_id"] = json!(format!("session-{i}"));
                    svc.append(parse_input(value).unwrap()).await
                })
            })
            .collect();

        // The store rejects an append whose expected tail has moved, so any
        // interleaving of tail reads and writes would surface as a conflict.
        let mut genesis = 0;
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            if result.entry.sig.prev_hash.is_none() {
                genesis += 1;
            }
        }
        assert_eq!(genesis, 1);
        assert_eq!(store.len(), 16);

        let verified = svc.verify(&VerifyRange::default()).await.unwrap();
        assert!(verified.valid, "{:?}", verified.diffs);
        assert_eq!(verified.checked, 16);
    }

    #[tokio::test]
    async fn same_millisecond_appends_keep_key_order_equal_to_chain_order() {
        let (svc, store) = service();
        let mut keys = Vec::new();
        for i in 0..8 {
            let mut value = body("2024-01-01T00:00:00.000Z");
            value["session_id"] = json!(format!("session-{i}"));
            keys.push(svc.append(parse_input(value).unwrap()).await.unwrap().key);
        }
        assert_eq!(store.keys(), keys);

        let result = svc.verify(&VerifyRange::default()).await.unwrap();
        assert!(result.valid, "{:?}", result.diffs);
        assert_eq!(result.checked, 8);
    }

    #[tokio::test]
    async fn explicit_null_reason_and_unknown_members_are_signed() {
        let (svc, store) = service();
        let mut value = body("2024-01-01T00:00:00Z");
        value["reason"] = json!(null);
        value["duration_ms"] = json!(12.5);
        value["pipeline"] = json!({"stage": "scan"});
        let a = svc.append(parse_input(value).unwrap()).await.unwrap();

        let stored = serde_json::to_value(&a.entry).unwrap();
        assert!(stored["reason"].is_null());
        assert_eq!(stored["duration_ms"], json!(12.5));
        assert_eq!(stored["pipeline"], json!({"stage": "scan"}));
        assert_eq!(
            ContentHasher::hash_value(&stored),
            ContentHasher::hash_stored(&a.entry).unwrap()
        );
        assert!(svc.verify(&VerifyRange::default()).await.unwrap().valid);

        store.tamper(&a.key, |r| {
            r.entry.entry.extra.insert("injected".into(), json!("x"));
        });
        let result = svc.verify(&VerifyRange::default()).await.unwrap();
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].reason, DiffReason::HmacMismatch);
    }

    #[tokio::test]
    async fn from_config_builds_memory_service() {
        let svc = LedgerService::from_config(&LedgerConfig::in_memory("s")).unwrap();
        assert_eq!(svc.policy(), RetentionPolicy::default());
        svc.append(input("2024-01-01T00:00:00Z")).await.unwrap();
        assert!(svc.verify(&VerifyRange::default()).await.unwrap().valid);
    }
}
