//! AWS Signature Version 4 request signing.
//!
//! canonical request → string-to-sign → signing key derived through the
//! date/region/service/`aws4_request` HMAC chain → `Authorization` header.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const TERMINATOR: &str = "aws4_request";

/// Hex SHA-256 of an empty payload.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Signs requests for one access key in one region/service.
#[derive(Clone)]
pub struct SigV4Signer {
    access_key_id: String,
    secret_access_key: String,
    region: String,
    service: String,
}

/// The parts of a request that SigV4 covers.
#[derive(Clone, Debug)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    /// Already URI-encoded absolute path.
    pub canonical_uri: &'a str,
    /// Unencoded query pairs.
    pub query: &'a [(String, String)],
    /// Headers to sign, including `host`, `x-amz-date` and
    /// `x-amz-content-sha256`.
    pub headers: &'a [(String, String)],
    pub payload_sha256: &'a str,
}

impl SigV4Signer {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            service: service.into(),
        }
    }

    /// `YYYYMMDDTHHMMSSZ`, the `x-amz-date` form.
    pub fn amz_date(now: &DateTime<Utc>) -> String {
        now.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn short_date(now: &DateTime<Utc>) -> String {
        now.format("%Y%m%d").to_string()
    }

    fn scope(&self, now: &DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/{}",
            Self::short_date(now),
            self.region,
            self.service,
            TERMINATOR
        )
    }

    /// Build the canonical request string.
    pub fn canonical_request(request: &SignableRequest<'_>) -> (String, String) {
        let (canonical_headers, signed_headers) = canonical_headers(request.headers);
        let query = canonical_query(request.query);
        let canonical = [
            request.method,
            request.canonical_uri,
            query.as_str(),
            canonical_headers.as_str(),
            signed_headers.as_str(),
            request.payload_sha256,
        ]
        .join("\n");
        (canonical, signed_headers)
    }

    /// Build the string to sign for a canonical request.
    pub fn string_to_sign(&self, canonical_request: &str, now: &DateTime<Utc>) -> String {
        let amz_date = Self::amz_date(now);
        let scope = self.scope(now);
        let digest = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        [ALGORITHM, amz_date.as_str(), scope.as_str(), digest.as_str()].join("\n")
    }

    /// Derive the signing key for the day of `now`.
    pub fn signing_key(&self, now: &DateTime<Utc>) -> StoreResult<Vec<u8>> {
        let secret = format!("AWS4{}", self.secret_access_key);
        let k_date = hmac(secret.as_bytes(), Self::short_date(now).as_bytes())?;
        let k_region = hmac(&k_date, self.region.as_bytes())?;
        let k_service = hmac(&k_region, self.service.as_bytes())?;
        hmac(&k_service, TERMINATOR.as_bytes())
    }

    /// Value of the `Authorization` header for `request` signed at `now`.
    pub fn authorization(
        &self,
        request: &SignableRequest<'_>,
        now: &DateTime<Utc>,
    ) -> StoreResult<String> {
        let (canonical, signed_headers) = Self::canonical_request(request);
        let string_to_sign = self.string_to_sign(&canonical, now);
        let signature = hex::encode(hmac(&self.signing_key(now)?, string_to_sign.as_bytes())?);
        Ok(format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id,
            self.scope(now),
        ))
    }
}

impl std::fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

fn hmac(key: &[u8], data: &[u8]) -> StoreResult<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| StoreError::InvalidConfig(format!("signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// URI-encode per SigV4: every byte except `A-Z a-z 0-9 - _ . ~` is
/// percent-encoded, and `/` too unless `keep_slash` is set.
pub fn uri_encode(input: &str, keep_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Encoded `k=v` pairs sorted by key then value, joined with `&`.
pub fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, false), uri_encode(v, false)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the canonical header block (each line `\n`-terminated) and the
/// `;`-joined signed header list.
fn canonical_headers(headers: &[(String, String)]) -> (String, String) {
    let mut lowered: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
            (name.to_ascii_lowercase(), collapsed)
        })
        .collect();
    lowered.sort_by(|a, b| a.0.cmp(&b.0));
    let block: String = lowered
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed = lowered
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    (block, signed)
}
