//! S3-compatible object storage backend with object-lock retention.
//!
//! Each record is one object holding the JSON of its stored entry. The
//! record envelope is mapped onto object-lock metadata:
//!
//! | record field      | request header (PUT)                      | response header (GET)                    |
//! |-------------------|-------------------------------------------|------------------------------------------|
//! | `retention_until` | `x-amz-object-lock-retain-until-date`     | same                                     |
//! | `legal_hold`      | `x-amz-object-lock-legal-hold: ON`        | same                                     |
//! | `created_at`      | not sent                                  | `last-modified`                          |
//!
//! Providers that omit the lock headers on read (unlocked or dev buckets)
//! fall back to the WORM metadata embedded in the entry.

mod config;
mod listing;
mod sigv4;

pub use config::{ObjectLockConfig, DEFAULT_REGION};
pub use listing::{ListBucketResult, ListedObject};
pub use sigv4::{canonical_query, uri_encode, SigV4Signer, SignableRequest, EMPTY_PAYLOAD_SHA256};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use wormlog_crypto::ContentHasher;
use wormlog_types::{parse_iso8601, format_iso8601, ListOptions, ListPage, LogStored, Record};

use crate::error::{StoreError, StoreResult};
use crate::traits::LedgerStore;

const SERVICE: &str = "s3";
const HEADER_LOCK_MODE: &str = "x-amz-object-lock-mode";
const HEADER_RETAIN_UNTIL: &str = "x-amz-object-lock-retain-until-date";
const HEADER_LEGAL_HOLD: &str = "x-amz-object-lock-legal-hold";

/// Record store backed by an S3-compatible bucket.
pub struct ObjectLockStore {
    config: ObjectLockConfig,
    signer: SigV4Signer,
    client: reqwest::Client,
    /// `scheme://host[:port]` of the endpoint.
    origin: String,
    /// Value signed as the `host` header.
    host: String,
}

/// A request before signing.
struct ObjectRequest {
    method: Method,
    /// Object key relative to the configured prefix; `None` addresses the bucket.
    key: Option<String>,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ObjectRequest {
    fn new(method: Method, key: Option<String>) -> Self {
        Self {
            method,
            key,
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }
}

impl ObjectLockStore {
    pub fn new(config: ObjectLockConfig) -> StoreResult<Self> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(config: ObjectLockConfig, client: reqwest::Client) -> StoreResult<Self> {
        let url = Url::parse(&config.endpoint)
            .map_err(|e| StoreError::InvalidConfig(format!("endpoint {}: {e}", config.endpoint)))?;
        let host_name = url
            .host_str()
            .ok_or_else(|| StoreError::InvalidConfig(format!("endpoint {} has no host", config.endpoint)))?;
        let host = match url.port() {
            Some(port) => format!("{host_name}:{port}"),
            None => host_name.to_string(),
        };
        if config.bucket.is_empty() {
            return Err(StoreError::InvalidConfig("bucket must not be empty".into()));
        }
        let signer = SigV4Signer::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            config.region.clone(),
            SERVICE,
        );
        Ok(Self {
            origin: format!("{}://{host}", url.scheme()),
            host,
            config,
            signer,
            client,
        })
    }

    pub fn config(&self) -> &ObjectLockConfig {
        &self.config
    }

    /// Full object key inside the bucket.
    fn object_key(&self, key: &str) -> String {
        match self.config.normalized_prefix() {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    /// Inverse of [`object_key`](Self::object_key); `None` for keys outside the prefix.
    fn record_key<'a>(&self, object_key: &'a str) -> Option<&'a str> {
        match self.config.normalized_prefix() {
            Some(prefix) => object_key
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('/')),
            None => Some(object_key),
        }
    }

    async fn send(&self, request: ObjectRequest) -> StoreResult<reqwest::Response> {
        let mut canonical_uri = format!("/{}", uri_encode(&self.config.bucket, false));
        if let Some(key) = &request.key {
            canonical_uri.push('/');
            canonical_uri.push_str(&uri_encode(&self.object_key(key), true));
        }
        let query = canonical_query(&request.query);
        let url = if query.is_empty() {
            format!("{}{canonical_uri}", self.origin)
        } else {
            format!("{}{canonical_uri}?{query}", self.origin)
        };

        let now = Utc::now();
        let payload_sha256 = ContentHasher::hash_bytes(&request.body);
        let mut headers = request.headers;
        headers.push(("x-amz-content-sha256".into(), payload_sha256.clone()));
        headers.push(("x-amz-date".into(), SigV4Signer::amz_date(&now)));

        let mut signed = headers.clone();
        signed.push(("host".into(), self.host.clone()));
        let authorization = self.signer.authorization(
            &SignableRequest {
                method: request.method.as_str(),
                canonical_uri: &canonical_uri,
                query: &request.query,
                headers: &signed,
                payload_sha256: &payload_sha256,
            },
            &now,
        )?;
        headers.push(("authorization".into(), authorization));

        tracing::debug!(method = %request.method, %url, "object store request");
        let response = self
            .client
            .request(request.method, url)
            .headers(to_header_map(&headers)?)
            .body(request.body)
            .send()
            .await?;
        Ok(response)
    }

    async fn unexpected(operation: &'static str, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        StoreError::UnexpectedStatus {
            operation,
            status,
            body,
        }
    }
}

fn to_header_map(headers: &[(String, String)]) -> StoreResult<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StoreError::InvalidConfig(format!("header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| StoreError::InvalidConfig(format!("header value for {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Rebuild the record envelope from response headers and the stored entry.
///
/// An object with neither a retain-until header nor embedded WORM metadata
/// is corrupt. A missing `last-modified` falls back to the entry timestamp.
fn record_from_response(key: &str, headers: &HeaderMap, entry: LogStored) -> StoreResult<Record> {
    let corrupt = |reason: &str| StoreError::CorruptObject {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let worm = entry.entry.worm.as_ref();
    let retention_until = header_str(headers, HEADER_RETAIN_UNTIL)
        .and_then(parse_iso8601)
        .or_else(|| {
            worm.and_then(|w| w.retention_until.as_deref())
                .and_then(parse_iso8601)
        })
        .ok_or_else(|| corrupt("no retention date in lock headers or entry"))?;
    let legal_hold = header_str(headers, HEADER_LEGAL_HOLD)
        .map(|v| v.eq_ignore_ascii_case("ON"))
        .or_else(|| worm.and_then(|w| w.legal_hold))
        .unwrap_or(false);
    let created_at = match header_str(headers, "last-modified")
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
    {
        Some(ts) => ts.with_timezone(&Utc),
        None => {
            tracing::warn!(key, "object has no usable last-modified; using entry timestamp");
            parse_iso8601(&entry.entry.ts_iso)
                .ok_or_else(|| corrupt("no last-modified and unparsable ts_iso"))?
        }
    };
    Ok(Record {
        key: key.to_string(),
        entry,
        retention_until,
        legal_hold,
        created_at,
    })
}

#[async_trait]
impl LedgerStore for ObjectLockStore {
    async fn append(&self, record: &Record) -> StoreResult<()> {
        let mut request = ObjectRequest::new(Method::PUT, Some(record.key.clone()));
        request.body = Bytes::from(serde_json::to_vec(&record.entry)?);
        request.headers = vec![
            ("content-type".into(), "application/json".into()),
            ("if-none-match".into(), "*".into()),
            (HEADER_LOCK_MODE.into(), "COMPLIANCE".into()),
            (HEADER_RETAIN_UNTIL.into(), format_iso8601(&record.retention_until)),
        ];
        if record.legal_hold {
            request.headers.push((HEADER_LEGAL_HOLD.into(), "ON".into()));
        }

        let response = self.send(request).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                Err(StoreError::AlreadyExists(record.key.clone()))
            }
            _ => Err(Self::unexpected("putObject", response).await),
        }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Record>> {
        let response = self
            .send(ObjectRequest::new(Method::GET, Some(key.to_string())))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::unexpected("getObject", response).await);
        }
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let entry: LogStored =
            serde_json::from_slice(&body).map_err(|e| StoreError::CorruptObject {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        record_from_response(key, &headers, entry).map(Some)
    }

    async fn list(&self, options: &ListOptions) -> StoreResult<ListPage> {
        let mut request = ObjectRequest::new(Method::GET, None);
        request.query.push(("list-type".into(), "2".into()));
        match (&options.cursor, &options.start_key) {
            (Some(cursor), _) => request
                .query
                .push(("continuation-token".into(), cursor.clone())),
            (None, Some(start)) => request
                .query
                .push(("start-after".into(), self.object_key(start))),
            (None, None) => {}
        }
        if let Some(limit) = options.limit {
            request
                .query
                .push(("max-keys".into(), limit.max(1).to_string()));
        }
        if let Some(prefix) = self.config.normalized_prefix() {
            request.query.push(("prefix".into(), format!("{prefix}/")));
        }

        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(Self::unexpected("listObjectsV2", response).await);
        }
        let listing = ListBucketResult::parse(&response.text().await?)?;

        let mut items = Vec::with_capacity(listing.contents.len());
        let mut passed_end = false;
        for object in &listing.contents {
            let Some(key) = self.record_key(&object.key) else {
                continue;
            };
            if options.end_key.as_deref().is_some_and(|end| key > end) {
                passed_end = true;
                break;
            }
            if let Some(record) = self.get(key).await? {
                items.push(record);
            }
        }

        let is_truncated = listing.is_truncated && !passed_end;
        Ok(ListPage {
            items,
            is_truncated,
            cursor: if is_truncated {
                listing.next_continuation_token
            } else {
                None
            },
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let response = self
            .send(ObjectRequest::new(Method::DELETE, Some(key.to_string())))
            .await?;
        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            StatusCode::CONFLICT | StatusCode::FORBIDDEN => {
                tracing::warn!(key, "object lock refused delete");
                Err(StoreError::RetentionActive {
                    key: key.to_string(),
                })
            }
            _ => Err(Self::unexpected("deleteObject", response).await),
        }
    }
}

impl std::fmt::Debug for ObjectLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLockStore")
            .field("config", &self.config)
            .field("host", &self.host)
            .finish()
    }
}
