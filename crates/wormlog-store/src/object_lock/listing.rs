use serde::Deserialize;

use crate::error::{StoreError, StoreResult};

/// The fields of a `ListObjectsV2` response this client needs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListBucketResult {
    #[serde(default)]
    pub contents: Vec<ListedObject>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListedObject {
    pub key: String,
}

impl ListBucketResult {
    pub fn parse(xml: &str) -> StoreResult<Self> {
        quick_xml::de::from_str(xml)
            .map_err(|e| StoreError::Serialization(format!("list response: {e}")))
    }
}
