use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use crate::error::{ServerError, ServerResult};

/// Credentials presented with a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Extract `Authorization: Bearer <token>` from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| Self::Bearer(token.trim().to_string()))
            .unwrap_or(Self::Anonymous)
    }
}

/// What a request wants to do with the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// List, get and verify.
    Read,
    /// Append and delete.
    Write,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Succeeds if `credentials` grant `scope`.
    async fn authorize(&self, credentials: &Credentials, scope: Scope) -> ServerResult<()>;
}

/// One shared bearer token per scope.
///
/// A scope without a configured token rejects every request with
/// [`ServerError::AuthNotConfigured`].
#[derive(Clone, Default)]
pub struct StaticTokenAuth {
    read_token: Option<String>,
    write_token: Option<String>,
}

impl StaticTokenAuth {
    pub fn new(read_token: Option<String>, write_token: Option<String>) -> Self {
        Self {
            read_token,
            write_token,
        }
    }

    fn token(&self, scope: Scope) -> Option<&str> {
        let token = match scope {
            Scope::Read => self.read_token.as_deref(),
            Scope::Write => self.write_token.as_deref(),
        };
        token.filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authorize(&self, credentials: &Credentials, scope: Scope) -> ServerResult<()> {
        let expected = self.token(scope).ok_or(ServerError::AuthNotConfigured(scope))?;
        match credentials {
            Credentials::Anonymous => Err(ServerError::Unauthorized(format!("{scope} token missing"))),
            Credentials::Bearer(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(())
            }
            Credentials::Bearer(_) => Err(ServerError::Unauthorized(format!("{scope} token invalid"))),
        }
    }
}

impl std::fmt::Debug for StaticTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuth")
            .field("read_token", &self.read_token.as_ref().map(|_| "<redacted>"))
            .field("write_token", &self.write_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
