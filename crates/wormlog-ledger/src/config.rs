//! Ledger configuration from environment variables.
//!
//! | variable                      | meaning                                          |
//! |-------------------------------|--------------------------------------------------|
//! | `AUDIT_CHAIN_SECRET`          | HMAC key for chain tags (required)               |
//! | `AUDIT_RETENTION_DAYS`        | default retention, positive integer (default 90) |
//! | `AUDIT_LEGAL_HOLD_DEFAULT`    | `true` puts new records under legal hold         |
//! | `AUDIT_STORE`                 | `memory` selects the in-memory store             |
//! | `AUDIT_S3_ENDPOINT`           | object store base URL                            |
//! | `AUDIT_S3_ACCOUNT_ID`         | R2 account, used when no endpoint is given       |
//! | `AUDIT_S3_ACCESS_KEY_ID`      | object store credentials                         |
//! | `AUDIT_S3_SECRET_ACCESS_KEY`  | object store credentials                         |
//! | `AUDIT_S3_BUCKET`             | bucket with object lock enabled                  |
//! | `AUDIT_S3_REGION`             | signing region (default `auto`)                  |
//! | `AUDIT_S3_PREFIX`             | key prefix inside the bucket                     |

use wormlog_store::ObjectLockConfig;

use crate::error::{LedgerError, LedgerResult};

pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Retention applied to appends that do not carry their own WORM request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention_days: u32,
    pub legal_hold_default: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            legal_hold_default: false,
        }
    }
}

/// Which store backend to construct.
#[derive(Clone, Debug)]
pub enum StoreConfig {
    Memory,
    ObjectLock(ObjectLockConfig),
}

/// Everything needed to build a [`LedgerService`](crate::LedgerService).
#[derive(Clone)]
pub struct LedgerConfig {
    pub chain_secret: String,
    pub policy: RetentionPolicy,
    pub store: StoreConfig,
}

impl LedgerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let chain_secret = var("AUDIT_CHAIN_SECRET")
            .ok_or_else(|| LedgerError::Validation("AUDIT_CHAIN_SECRET must be configured".into()))?;

        let retention_days = match var("AUDIT_RETENTION_DAYS") {
            Some(raw) => raw.parse::<u32>().ok().filter(|d| *d > 0).ok_or_else(|| {
                LedgerError::Validation("AUDIT_RETENTION_DAYS must be a positive integer".into())
            })?,
            None => DEFAULT_RETENTION_DAYS,
        };
        let legal_hold_default = var("AUDIT_LEGAL_HOLD_DEFAULT")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let store = if var("AUDIT_STORE").is_some_and(|v| v.eq_ignore_ascii_case("memory")) {
            StoreConfig::Memory
        } else {
            let endpoint = match (var("AUDIT_S3_ENDPOINT"), var("AUDIT_S3_ACCOUNT_ID")) {
                (Some(endpoint), _) => Some(endpoint),
                (None, Some(account)) => Some(ObjectLockConfig::r2_endpoint(&account)),
                (None, None) => None,
            };
            match (
                endpoint,
                var("AUDIT_S3_ACCESS_KEY_ID"),
                var("AUDIT_S3_SECRET_ACCESS_KEY"),
                var("AUDIT_S3_BUCKET"),
            ) {
                (Some(endpoint), Some(access_key), Some(secret_key), Some(bucket)) => {
                    let mut cfg = ObjectLockConfig::new(endpoint, access_key, secret_key, bucket);
                    if let Some(region) = var("AUDIT_S3_REGION") {
                        cfg = cfg.with_region(region);
                    }
                    if let Some(prefix) = var("AUDIT_S3_PREFIX") {
                        cfg = cfg.with_prefix(prefix);
                    }
                    StoreConfig::ObjectLock(cfg)
                }
                _ => {
                    return Err(LedgerError::Validation(
                        "object store credentials are not fully configured".into(),
                    ))
                }
            }
        };

        Ok(Self {
            chain_secret,
            policy: RetentionPolicy {
                retention_days,
                legal_hold_default,
            },
            store,
        })
    }

    /// In-memory configuration with default policy, for tests and demos.
    pub fn in_memory(chain_secret: impl Into<String>) -> Self {
        Self {
            chain_secret: chain_secret.into(),
            policy: RetentionPolicy::default(),
            store: StoreConfig::Memory,
        }
    }
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("chain_secret", &"<redacted>")
            .field("policy", &self.policy)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn memory_store_with_defaults() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "s3cret"),
            ("AUDIT_STORE", "memory"),
        ]))
        .unwrap();
        assert_eq!(cfg.chain_secret, "s3cret");
        assert_eq!(cfg.policy, RetentionPolicy::default());
        assert!(matches!(cfg.store, StoreConfig::Memory));
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = LedgerConfig::from_lookup(lookup(&[("AUDIT_STORE", "memory")])).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("AUDIT_CHAIN_SECRET")));

        let err = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "  "),
            ("AUDIT_STORE", "memory"),
        ]))
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn retention_days_must_be_positive() {
        for bad in ["0", "-3", "ninety", "1.5"] {
            let err = LedgerConfig::from_lookup(lookup(&[
                ("AUDIT_CHAIN_SECRET", "s"),
                ("AUDIT_STORE", "memory"),
                ("AUDIT_RETENTION_DAYS", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("AUDIT_RETENTION_DAYS")), "{bad}");
        }
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "s"),
            ("AUDIT_STORE", "memory"),
            ("AUDIT_RETENTION_DAYS", "365"),
            ("AUDIT_LEGAL_HOLD_DEFAULT", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(cfg.policy.retention_days, 365);
        assert!(cfg.policy.legal_hold_default);
    }

    #[test]
    fn object_store_from_account_id() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "s"),
            ("AUDIT_S3_ACCOUNT_ID", "acct"),
            ("AUDIT_S3_ACCESS_KEY_ID", "ak"),
            ("AUDIT_S3_SECRET_ACCESS_KEY", "sk"),
            ("AUDIT_S3_BUCKET", "audit"),
            ("AUDIT_S3_PREFIX", "ledger"),
        ]))
        .unwrap();
        let StoreConfig::ObjectLock(store) = cfg.store else {
            panic!("expected object store");
        };
        assert_eq!(store.endpoint, "https://acct.r2.cloudflarestorage.com");
        assert_eq!(store.region, "auto");
        assert_eq!(store.normalized_prefix(), Some("ledger"));
    }

    #[test]
    fn explicit_endpoint_wins_over_account() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "s"),
            ("AUDIT_S3_ENDPOINT", "http://minio:9000"),
            ("AUDIT_S3_ACCOUNT_ID", "acct"),
            ("AUDIT_S3_ACCESS_KEY_ID", "ak"),
            ("AUDIT_S3_SECRET_ACCESS_KEY", "sk"),
            ("AUDIT_S3_BUCKET", "audit"),
            ("AUDIT_S3_REGION", "us-east-1"),
        ]))
        .unwrap();
        let StoreConfig::ObjectLock(store) = cfg.store else {
            panic!("expected object store");
        };
        assert_eq!(store.endpoint, "http://minio:9000");
        assert_eq!(store.region, "us-east-1");
    }

    #[test]
    fn incomplete_object_store_credentials_are_rejected() {
        let err = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "s"),
            ("AUDIT_S3_ACCOUNT_ID", "acct"),
            ("AUDIT_S3_BUCKET", "audit"),
        ]))
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("credentials")));
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = LedgerConfig::from_lookup(lookup(&[
            ("AUDIT_CHAIN_SECRET", "chain-secret-value"),
            ("AUDIT_S3_ACCOUNT_ID", "acct"),
            ("AUDIT_S3_ACCESS_KEY_ID", "ak"),
            ("AUDIT_S3_SECRET_ACCESS_KEY", "s3-secret-value"),
            ("AUDIT_S3_BUCKET", "audit"),
        ]))
        .unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("chain-secret-value"));
        assert!(!debug.contains("s3-secret-value"));
    }
}
