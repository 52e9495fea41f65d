//! Ledger service for the wormlog audit ledger.
//!
//! This crate is the only component callers talk to. It provides:
//! - Input validation and normalization of audit entries
//! - Retention computation and record key derivation
//! - Hash-chained, HMAC-signed appends serialized per service instance
//! - Range verification that reports every chain discontinuity
//! - Configuration from environment variables

pub mod config;
pub mod error;
pub mod key;
pub mod service;
pub mod validation;

pub use config::{LedgerConfig, RetentionPolicy, StoreConfig, DEFAULT_RETENTION_DAYS};
pub use error::{LedgerError, LedgerResult};
pub use key::{derive_key, derive_key_after};
pub use service::{LedgerService, DEFAULT_VERIFY_PAGE_SIZE};
pub use validation::{normalize_input, parse_input};
