use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use wormlog_ledger::LedgerError;

use crate::auth::Scope;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} token is not configured")]
    AuthNotConfigured(Scope),

    #[error("{0}")]
    Unauthorized(String),

    #[error("not found")]
    NotFound,

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// JSON error body: a machine-readable kind and an optional detail.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ServerError {
    /// Status code and error kind reported to the client.
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::AuthNotConfigured(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "authorization_not_configured")
            }
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            Self::Ledger(LedgerError::Validation(_)) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Self::Ledger(LedgerError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            Self::Ledger(LedgerError::RetentionViolation { .. }) => {
                (StatusCode::CONFLICT, "retention_active")
            }
            Self::Ledger(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Self::NotFound => None,
            Self::Ledger(LedgerError::RetentionViolation { .. }) => {
                Some("Object is locked by retention policy".into())
            }
            Self::Ledger(LedgerError::Validation(_) | LedgerError::Conflict(_))
            | Self::InvalidRequest(_)
            | Self::AuthNotConfigured(_)
            | Self::Unauthorized(_) => Some(self.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error,
            detail: self.detail(),
        };
        (status, Json(body)).into_response()
    }
}
