use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use wormlog_ledger::{parse_input, LedgerService};
use wormlog_types::{ListOptions, VerifyRange};

use crate::auth::{AuthProvider, Credentials, Scope};
use crate::error::{ServerError, ServerResult};

/// Largest page a client may request from `GET /audit`.
pub const MAX_LIST_LIMIT: u64 = 1000;
/// Largest page size a client may request from `POST /audit/verify`.
pub const MAX_VERIFY_LIMIT: u64 = 5000;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerService>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn new(ledger: Arc<LedgerService>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { ledger, auth }
    }

    async fn authorize(&self, headers: &HeaderMap, scope: Scope) -> ServerResult<()> {
        self.auth
            .authorize(&Credentials::from_headers(headers), scope)
            .await
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /audit`
pub async fn append_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    state.authorize(&headers, Scope::Write).await?;
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(format!("invalid JSON body: {e}")))?;
    let result = state.ledger.append(parse_input(value)?).await?;
    Ok((StatusCode::CREATED, Json(result)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub start_key: Option<String>,
    pub end_key: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

/// `GET /audit`
pub async fn list_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ServerResult<Response> {
    state.authorize(&headers, Scope::Read).await?;
    let Query(query) = query.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;

    let limit = match query.limit.as_deref() {
        Some(raw) => Some(parse_limit(raw, MAX_LIST_LIMIT)?),
        None => None,
    };
    let options = ListOptions {
        start_key: query.start_key.filter(|k| !k.is_empty()),
        end_key: query.end_key.filter(|k| !k.is_empty()),
        cursor: query.cursor.filter(|k| !k.is_empty()),
        limit,
    };
    let page = state.ledger.list(&options).await?;
    Ok(Json(page).into_response())
}

/// `GET /audit/{key}`
pub async fn get_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    state.authorize(&headers, Scope::Read).await?;
    let key = record_key(&key)?;
    match state.ledger.get(key).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(ServerError::NotFound),
    }
}

/// `DELETE /audit/{key}`
pub async fn delete_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    state.authorize(&headers, Scope::Write).await?;
    let key = record_key(&key)?;
    state.ledger.delete(key).await?;
    Ok(Json(json!({ "deleted": true })).into_response())
}

/// `POST /audit/{key}`: only `/audit/verify` accepts POST.
pub async fn post_key_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    body: Bytes,
) -> ServerResult<Response> {
    if key.trim_matches('/') != "verify" {
        return Err(ServerError::NotFound);
    }
    verify_handler(state, headers, body).await
}

/// `POST /audit/verify`
async fn verify_handler(state: AppState, headers: HeaderMap, body: Bytes) -> ServerResult<Response> {
    state.authorize(&headers, Scope::Read).await?;
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ServerError::InvalidRequest(format!("invalid JSON body: {e}")))?
    };
    let range = verify_range(&value)?;
    let result = state.ledger.verify(&range).await?;
    Ok(Json(result).into_response())
}

fn verify_range(value: &Value) -> ServerResult<VerifyRange> {
    let Some(body) = value.as_object() else {
        return Err(ServerError::InvalidRequest("body must be a JSON object".into()));
    };
    let key = |name: &str| -> ServerResult<Option<String>> {
        match body.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ServerError::InvalidRequest(format!("{name} must be a string"))),
        }
    };
    let limit = match body.get("limit") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_u64()
                .filter(|n| (1..=MAX_VERIFY_LIMIT).contains(n))
                .ok_or_else(|| limit_error(MAX_VERIFY_LIMIT))? as usize,
        ),
    };
    Ok(VerifyRange {
        start_key: key("start_key")?,
        end_key: key("end_key")?,
        limit,
    })
}

fn parse_limit(raw: &str, max: u64) -> ServerResult<usize> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| (1..=max).contains(n))
        .map(|n| n as usize)
        .ok_or_else(|| limit_error(max))
}

fn limit_error(max: u64) -> ServerError {
    ServerError::InvalidRequest(format!("limit must be between 1 and {max}"))
}

fn record_key(raw: &str) -> ServerResult<&str> {
    let key = raw.trim_start_matches('/');
    if key.is_empty() {
        return Err(ServerError::InvalidRequest("key missing".into()));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_bounds() {
        assert_eq!(parse_limit("1", MAX_LIST_LIMIT).unwrap(), 1);
        assert_eq!(parse_limit("1000", MAX_LIST_LIMIT).unwrap(), 1000);
        for bad in ["0", "1001", "-1", "abc", "2.5", ""] {
            assert!(parse_limit(bad, MAX_LIST_LIMIT).is_err(), "{bad}");
        }
    }

    #[test]
    fn verify_range_parsing() {
        let range = verify_range(&json!({"start_key": "a", "end_key": "", "limit": 5000})).unwrap();
        assert_eq!(range.start_key.as_deref(), Some("a"));
        assert!(range.end_key.is_none());
        assert_eq!(range.limit, Some(5000));

        assert!(verify_range(&json!({"limit": 0})).is_err());
        assert!(verify_range(&json!({"limit": 5001})).is_err());
        assert!(verify_range(&json!({"limit": "10"})).is_err());
        assert!(verify_range(&json!({"start_key": 3})).is_err());
        assert!(verify_range(&json!([])).is_err());
        assert_eq!(verify_range(&json!({})).unwrap(), VerifyRange::default());
    }

    #[test]
    fn empty_keys_are_rejected() {
        assert!(record_key("").is_err());
        assert!(record_key("/").is_err());
        assert_eq!(record_key("2024/01/01/x.json").unwrap(), "2024/01/01/x.json");
    }
}
