use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::models::ContentMeta;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not_found")]
    NotFound,
    #[error("status {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
    #[error("decode: {0}")]
    Decode(String),
}

/// Tag filter applied by the tag index (`name == value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Write-once content storage, read side.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StorageError>;
    async fn head(&self, id: &str) -> Result<ContentMeta, StorageError>;
}

/// Metadata index of the storage network.
#[async_trait]
pub trait TagIndex: Send + Sync {
    /// Subset of `ids` carrying `tag`.
    async fn matching(&self, ids: &[String], tag: &Tag) -> Result<HashSet<String>, StorageError>;
}

// ---------------- Arweave gateway (HTTP + GraphQL) ----------------
const TAG_QUERY: &str = r#"query($ids: [ID!], $tags: [TagFilter!], $first: Int) {
  transactions(ids: $ids, tags: $tags, first: $first) {
    edges { node { id } }
  }
}"#;

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
}
#[derive(Deserialize)]
struct GraphQlData {
    transactions: Transactions,
}
#[derive(Deserialize)]
struct Transactions {
    edges: Vec<Edge>,
}
#[derive(Deserialize)]
struct Edge {
    node: Node,
}
#[derive(Deserialize)]
struct Node {
    id: String,
}

#[derive(Clone)]
pub struct ArweaveGateway {
    http: reqwest::Client,
    base_url: String,
}

impl ArweaveGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url_for(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(id))
    }
}

fn status_error(status: reqwest::StatusCode) -> StorageError {
    if status == reqwest::StatusCode::NOT_FOUND {
        StorageError::NotFound
    } else {
        StorageError::Status(status.as_u16())
    }
}

#[async_trait]
impl ContentStore for ArweaveGateway {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .http
            .get(self.url_for(id))
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            debug!("gateway GET {id} -> {}", resp.status());
            return Err(status_error(resp.status()));
        }
        let bytes = resp.bytes().await.map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn head(&self, id: &str) -> Result<ContentMeta, StorageError> {
        let resp = self
            .http
            .head(self.url_for(id))
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status()));
        }
        let headers = resp.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let size = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        Ok(ContentMeta { content_type, size })
    }
}

#[async_trait]
impl TagIndex for ArweaveGateway {
    async fn matching(&self, ids: &[String], tag: &Tag) -> Result<HashSet<String>, StorageError> {
        let body = json!({
            "query": TAG_QUERY,
            "variables": {
                "ids": ids,
                "tags": [{ "name": tag.name, "values": [tag.value] }],
                "first": ids.len(),
            }
        });
        let resp = self
            .http
            .post(format!("{}/graphql", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("tag query failed: {e}");
                StorageError::Transport(e.to_string())
            })?;
        if !resp.status().is_success() {
            warn!("tag query returned {}", resp.status());
            return Err(StorageError::Status(resp.status().as_u16()));
        }
        let parsed: GraphQlResponse = resp.json().await.map_err(|e| StorageError::Decode(e.to_string()))?;
        let data = parsed.data.ok_or_else(|| StorageError::Decode("missing data".into()))?;
        Ok(data.transactions.edges.into_iter().map(|e| e.node.id).collect())
    }
}
