use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::models::{Principal, TokenId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unreachable: {0}")]
    Transport(String),
    #[error("registry returned status {0}")]
    Status(u16),
    #[error("registry response malformed: {0}")]
    Decode(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// NFT registry holding minted post tokens.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn total_supply(&self) -> RegistryResult<u64>;
    async fn list_tokens(&self, start: u64, count: u64) -> RegistryResult<Vec<TokenId>>;
    /// Output is parallel to `tokens`; `None` marks an unowned token.
    async fn resolve_owners(&self, tokens: &[TokenId]) -> RegistryResult<Vec<Option<Principal>>>;
}

/// JSON bridge in front of the registry canister: `POST {base}/{method}`.
#[derive(Clone)]
pub struct HttpRegistry {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    async fn call<A: Serialize + Sync, R: DeserializeOwned>(&self, method: &str, args: &A) -> RegistryResult<R> {
        let url = format!("{}/{}", self.base_url, method);
        debug!("registry call {url}");
        let resp = self
            .http
            .post(&url)
            .json(args)
            .send()
            .await
            .map_err(|e| {
                error!("registry call {method} failed: {e}");
                RegistryError::Transport(e.to_string())
            })?;
        if !resp.status().is_success() {
            return Err(RegistryError::Status(resp.status().as_u16()));
        }
        resp.json::<R>().await.map_err(|e| RegistryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn total_supply(&self) -> RegistryResult<u64> {
        let supply: TokenId = self.call("icrc7_total_supply", &json!({})).await?;
        u64::try_from(supply.0).map_err(|_| RegistryError::Decode(format!("supply {supply} exceeds u64")))
    }

    async fn list_tokens(&self, start: u64, count: u64) -> RegistryResult<Vec<TokenId>> {
        self.call("icrc7_tokens", &json!({ "start": start, "count": count })).await
    }

    async fn resolve_owners(&self, tokens: &[TokenId]) -> RegistryResult<Vec<Option<Principal>>> {
        self.call("icrc7_owner_of", &json!({ "token_ids": tokens })).await
    }
}
