//! Cryptographic primitives for the wormlog audit ledger.
//!
//! - [`canonicalize`]: deterministic, key-sorted JSON rendering
//! - [`ContentHasher`]: SHA-256 over the canonical form of an entry
//! - [`ChainSigner`]: HMAC-SHA256 chain tags linking an entry to its predecessor
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod canonical;
pub mod chain;
pub mod error;
pub mod hasher;

pub use canonical::{canonical_entry_payload, canonicalize};
pub use chain::ChainSigner;
pub use error::CryptoError;
pub use hasher::ContentHasher;
