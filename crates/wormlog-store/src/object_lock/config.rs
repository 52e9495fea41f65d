use serde::{Deserialize, Serialize};

/// Default region for providers that ignore it (Cloudflare R2).
pub const DEFAULT_REGION: &str = "auto";

/// Connection settings for an S3-compatible bucket with object lock.
#[derive(Clone, Serialize, Deserialize)]
pub struct ObjectLockConfig {
    /// Base URL, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// Key prefix inside the bucket; trailing slashes are ignored.
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl ObjectLockConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: default_region(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            bucket: bucket.into(),
            prefix: None,
        }
    }

    /// Endpoint of a Cloudflare R2 account.
    pub fn r2_endpoint(account_id: &str) -> String {
        format!("https://{account_id}.r2.cloudflarestorage.com")
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The prefix without trailing slashes, or `None` when empty.
    pub fn normalized_prefix(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.trim_end_matches('/'))
            .filter(|p| !p.is_empty())
    }
}

impl std::fmt::Debug for ObjectLockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLockConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}
