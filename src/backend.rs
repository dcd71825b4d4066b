//! Engagement backend: reactions, views and impressions keyed by content id.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::models::{Principal, ReactionKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend answered with its own error envelope.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("transport: {0}")]
    Transport(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: u64,
    pub dislikes: u64,
    pub total_comments: u64,
}

#[async_trait]
pub trait EngagementBackend: Send + Sync {
    async fn get_reaction_counts(&self, id: &str) -> BackendResult<ReactionCounts>;
    async fn get_view_count(&self, id: &str) -> BackendResult<u64>;
    async fn get_impressions(&self, id: &str) -> BackendResult<u64>;
    async fn get_user_reaction(&self, id: &str, caller: &Principal) -> BackendResult<Option<ReactionKind>>;
    async fn add_reaction(&self, id: &str, kind: ReactionKind, caller: &Principal) -> BackendResult<()>;
    async fn record_view(&self, id: &str) -> BackendResult<()>;
    async fn record_impression(&self, id: &str) -> BackendResult<()>;
}

/// Result-or-error envelope as returned by the backend canister.
#[derive(Debug, Deserialize)]
enum Envelope<T> {
    Ok(T),
    Err(String),
}

impl<T> Envelope<T> {
    fn into_result(self) -> BackendResult<T> {
        match self {
            Envelope::Ok(v) => Ok(v),
            Envelope::Err(msg) => Err(BackendError::Rejected(msg)),
        }
    }
}

const CALLER_HEADER: &str = "x-caller-principal";

#[derive(Clone)]
pub struct HttpEngagementBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpEngagementBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        args: serde_json::Value,
        caller: Option<&Principal>,
    ) -> BackendResult<R> {
        let mut req = self.http.post(format!("{}/{}", self.base_url, method)).json(&args);
        if let Some(p) = caller {
            req = req.header(CALLER_HEADER, p.as_str());
        }
        let resp = req.send().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            debug!("backend {method} -> {}", resp.status());
            return Err(BackendError::Transport(format!("status {}", resp.status().as_u16())));
        }
        let env: Envelope<R> = resp.json().await.map_err(|e| BackendError::Transport(e.to_string()))?;
        env.into_result()
    }
}

#[async_trait]
impl EngagementBackend for HttpEngagementBackend {
    async fn get_reaction_counts(&self, id: &str) -> BackendResult<ReactionCounts> {
        self.call("get_reaction_counts", json!({ "post_id": id }), None).await
    }
    async fn get_view_count(&self, id: &str) -> BackendResult<u64> {
        self.call("get_view_count", json!({ "post_id": id }), None).await
    }
    async fn get_impressions(&self, id: &str) -> BackendResult<u64> {
        self.call("get_impressions", json!({ "post_id": id }), None).await
    }
    async fn get_user_reaction(&self, id: &str, caller: &Principal) -> BackendResult<Option<ReactionKind>> {
        self.call("get_user_reaction", json!({ "post_id": id }), Some(caller)).await
    }
    async fn add_reaction(&self, id: &str, kind: ReactionKind, caller: &Principal) -> BackendResult<()> {
        self.call("add_reaction", json!({ "post_id": id, "reaction": kind }), Some(caller)).await
    }
    async fn record_view(&self, id: &str) -> BackendResult<()> {
        self.call("record_view", json!({ "post_id": id }), None).await
    }
    async fn record_impression(&self, id: &str) -> BackendResult<()> {
        self.call("record_impression", json!({ "post_id": id }), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_maps_to_result() {
        let ok: Envelope<u64> = serde_json::from_str(r#"{"Ok": 12}"#).unwrap();
        assert_eq!(ok.into_result(), Ok(12));
        let err: Envelope<u64> = serde_json::from_str(r#"{"Err": "no such post"}"#).unwrap();
        assert_eq!(err.into_result(), Err(BackendError::Rejected("no such post".into())));
        let unit: Envelope<()> = serde_json::from_str(r#"{"Ok": null}"#).unwrap();
        assert!(unit.into_result().is_ok());
        let reaction: Envelope<Option<ReactionKind>> = serde_json::from_str(r#"{"Ok": "Dislike"}"#).unwrap();
        assert_eq!(reaction.into_result(), Ok(Some(ReactionKind::Dislike)));
    }
}
