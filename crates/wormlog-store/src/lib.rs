//! Append-once record storage for the wormlog audit ledger.
//!
//! A store is an ordered key-value space of [`Record`]s. Keys sort in
//! creation order, which makes iteration order equal to chain order.
//!
//! # Storage Backends
//!
//! All backends implement the [`LedgerStore`] trait:
//!
//! - [`InMemoryStore`]: `BTreeMap`-based store for tests and non-durable deployments
//! - [`ObjectLockStore`]: S3-compatible object storage with object-lock retention
//!
//! # Design Rules
//!
//! 1. Records are written once. A second write to the same key is a conflict.
//! 2. There is no update operation.
//! 3. Delete is refused while the retention timer runs or a legal hold is set.
//! 4. Deleting an absent key is a no-op.
//! 5. All I/O errors are propagated, never silently ignored or retried.
//!
//! [`Record`]: wormlog_types::Record

pub mod error;
pub mod memory;
pub mod object_lock;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use object_lock::{ObjectLockConfig, ObjectLockStore, SigV4Signer};
pub use traits::LedgerStore;
