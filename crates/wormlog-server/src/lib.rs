//! HTTP server for the wormlog audit ledger.
//!
//! Thin translation of REST calls onto a [`LedgerService`]: bearer-token
//! scopes in front, the ledger error taxonomy mapped to status codes and
//! JSON `{error, detail}` bodies behind.
//!
//! [`LedgerService`]: wormlog_ledger::LedgerService

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use auth::{AuthProvider, Credentials, Scope, StaticTokenAuth};
pub use config::ServerConfig;
pub use error::{ErrorBody, ServerError, ServerResult};
pub use handler::AppState;
pub use server::WormlogServer;
