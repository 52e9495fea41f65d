//! Foundation types for the wormlog audit ledger.
//!
//! Every other wormlog crate depends on `wormlog-types`. The types here are
//! plain data: they carry no storage or cryptographic behaviour.
//!
//! # Key Types
//!
//! - [`LogInput`]: a file-handling decision as submitted by a pipeline
//! - [`LogStored`]: a normalized entry plus its chain [`Signature`]
//! - [`Record`]: the store-level envelope with key and WORM metadata
//! - [`ListOptions`] / [`ListPage`]: cursor-paginated range listing
//! - [`ChainDiff`] / [`VerifyResult`]: output of chain verification

pub mod entry;
pub mod error;
pub mod record;
pub mod timestamp;
pub mod verify;

pub use entry::{
    Checksum, ChecksumAlgorithm, LogInput, LogStored, Outcome, SafeCopyMetadata, Signature,
    WormMetadata, ENTRY_VERSION, SIGNATURE_MEMBER,
};
pub use error::TypeError;
pub use record::{AppendResult, ListOptions, ListPage, Record};
pub use timestamp::{format_iso8601, normalize_iso8601, parse_iso8601};
pub use verify::{ChainDiff, DiffReason, VerifyRange, VerifyResult};
