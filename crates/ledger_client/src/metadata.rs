use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::MetadataError;

/// Content identifier returned by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn pin_json(&self, name: &str, content: &Value) -> Result<ContentId, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash", default)]
    ipfs_hash: String,
}

/// Client for a JSON pinning service.
pub struct PinningClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl PinningClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl MetadataStore for PinningClient {
    async fn pin_json(&self, name: &str, content: &Value) -> Result<ContentId, MetadataError> {
        let body = json!({
            "pinataMetadata": { "name": name },
            "pinataContent": content,
        });

        let mut request = self
            .http
            .post(format!("{}/pinning/pinJSONToIPFS", self.base_url))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response: PinResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.ipfs_hash.is_empty() {
            warn!("metadata: store returned no content id name={name}");
            return Err(MetadataError::EmptyContentId);
        }
        info!("metadata: pinned name={name} cid={}", response.ipfs_hash);
        Ok(ContentId(response.ipfs_hash))
    }
}

pub struct MissingMetadataStore;

#[async_trait]
impl MetadataStore for MissingMetadataStore {
    async fn pin_json(&self, _name: &str, _content: &Value) -> Result<ContentId, MetadataError> {
        Err(MetadataError::Unavailable)
    }
}

#[cfg(test)]
#[path = "tests/metadata_tests.rs"]
mod tests;
