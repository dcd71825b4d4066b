#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use async_trait::async_trait;
use dialectica::backend::{BackendError, BackendResult, EngagementBackend, ReactionCounts};
use dialectica::codec::token_to_content_id;
use dialectica::models::{ContentMeta, Principal, ReactionKind, TokenId};
use dialectica::registry::{Registry, RegistryError, RegistryResult};
use dialectica::storage::{ContentStore, StorageError, Tag, TagIndex};
use dialectica::{FeedConfig, FeedDeps};

#[derive(Default)]
pub struct MockRegistry {
    pub tokens: Vec<TokenId>,
    /// Reported instead of `tokens.len()` when set.
    pub supply: Option<u64>,
    pub owners: HashMap<TokenId, Principal>,
    pub fail_supply: AtomicBool,
    pub fail_owners: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl MockRegistry {
    pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
    pub fn count(&self, name: &str) -> usize { self.calls().iter().filter(|c| *c == name).count() }
    fn log(&self, name: &str) { self.calls.lock().unwrap().push(name.to_string()); }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn total_supply(&self) -> RegistryResult<u64> {
        self.log("total_supply");
        if self.fail_supply.load(Ordering::SeqCst) { return Err(RegistryError::Transport("down".into())); }
        Ok(self.supply.unwrap_or(self.tokens.len() as u64))
    }
    async fn list_tokens(&self, start: u64, count: u64) -> RegistryResult<Vec<TokenId>> {
        self.log("list_tokens");
        Ok(self.tokens.iter().skip(start as usize).take(count as usize).copied().collect())
    }
    async fn resolve_owners(&self, tokens: &[TokenId]) -> RegistryResult<Vec<Option<Principal>>> {
        self.log("resolve_owners");
        if self.fail_owners.load(Ordering::SeqCst) { return Err(RegistryError::Status(503)); }
        Ok(tokens.iter().map(|t| self.owners.get(t).cloned()).collect())
    }
}

/// `tagged == None` makes every query fail.
#[derive(Default)]
pub struct MockIndex {
    pub tagged: Option<HashSet<String>>,
    pub queries: AtomicUsize,
}

#[async_trait]
impl TagIndex for MockIndex {
    async fn matching(&self, ids: &[String], tag: &Tag) -> Result<HashSet<String>, StorageError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        assert_eq!(tag.name, "Application-Name");
        match &self.tagged {
            Some(set) => Ok(ids.iter().filter(|i| set.contains(*i)).cloned().collect()),
            None => Err(StorageError::Status(500)),
        }
    }
}

#[derive(Default)]
pub struct MockStore {
    pub objects: HashMap<String, Vec<u8>>,
    /// Suspend once per fetch so concurrent callers interleave.
    pub yield_on_fetch: bool,
    pub fetches: AtomicUsize,
}

#[async_trait]
impl ContentStore for MockStore {
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.yield_on_fetch { tokio::task::yield_now().await; }
        self.objects.get(id).cloned().ok_or(StorageError::NotFound)
    }
    async fn head(&self, id: &str) -> Result<ContentMeta, StorageError> {
        if self.objects.contains_key(id) {
            Ok(ContentMeta { content_type: Some("image/png".into()), size: Some(4) })
        } else {
            Err(StorageError::NotFound)
        }
    }
}

#[derive(Default)]
pub struct MockBackend {
    pub counts: ReactionCounts,
    pub views: u64,
    pub impressions: u64,
    pub user_reaction: Option<ReactionKind>,
    pub fail_views: bool,
    pub reject_reactions: bool,
    /// `add_reaction` waits for a permit on this before answering.
    pub reaction_gate: Option<Arc<Notify>>,
    pub reactions: Mutex<Vec<(String, ReactionKind, Principal)>>,
    pub recorded_views: AtomicUsize,
    pub recorded_impressions: AtomicUsize,
}

#[async_trait]
impl EngagementBackend for MockBackend {
    async fn get_reaction_counts(&self, _id: &str) -> BackendResult<ReactionCounts> { Ok(self.counts) }
    async fn get_view_count(&self, _id: &str) -> BackendResult<u64> {
        if self.fail_views { return Err(BackendError::Rejected("views unavailable".into())); }
        Ok(self.views)
    }
    async fn get_impressions(&self, _id: &str) -> BackendResult<u64> { Ok(self.impressions) }
    async fn get_user_reaction(&self, _id: &str, _caller: &Principal) -> BackendResult<Option<ReactionKind>> {
        Ok(self.user_reaction)
    }
    async fn add_reaction(&self, id: &str, kind: ReactionKind, caller: &Principal) -> BackendResult<()> {
        if let Some(gate) = &self.reaction_gate { gate.notified().await; }
        if self.reject_reactions { return Err(BackendError::Rejected("nope".into())); }
        self.reactions.lock().unwrap().push((id.to_string(), kind, caller.clone()));
        Ok(())
    }
    async fn record_view(&self, _id: &str) -> BackendResult<()> {
        self.recorded_views.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn record_impression(&self, _id: &str) -> BackendResult<()> {
        self.recorded_impressions.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Transport("telemetry is best effort".into()))
    }
}

pub fn cid(i: u128) -> String {
    token_to_content_id(TokenId(i))
}

pub fn payload(text: &str, created_at: i64) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "content": text, "createdAt": created_at, "version": "1.0" })).unwrap()
}

/// `n` minted tokens, all tagged, each with a JSON post "post {i}".
pub struct World {
    pub registry: MockRegistry,
    pub index: MockIndex,
    pub store: MockStore,
    pub backend: MockBackend,
}

impl World {
    pub fn new(n: u128) -> Self {
        let tokens: Vec<TokenId> = (0..n).map(TokenId).collect();
        let tagged = tokens.iter().map(|t| cid(t.0)).collect();
        let objects = tokens
            .iter()
            .map(|t| (cid(t.0), payload(&format!("post {}", t.0), 1_000 + t.0 as i64)))
            .collect();
        Self {
            registry: MockRegistry { tokens, ..Default::default() },
            index: MockIndex { tagged: Some(tagged), ..Default::default() },
            store: MockStore { objects, ..Default::default() },
            backend: MockBackend::default(),
        }
    }

    pub fn build(self) -> Handles {
        Handles {
            registry: Arc::new(self.registry),
            index: Arc::new(self.index),
            store: Arc::new(self.store),
            backend: Arc::new(self.backend),
        }
    }
}

pub struct Handles {
    pub registry: Arc<MockRegistry>,
    pub index: Arc<MockIndex>,
    pub store: Arc<MockStore>,
    pub backend: Arc<MockBackend>,
}

impl Handles {
    pub fn deps(&self) -> FeedDeps {
        FeedDeps {
            registry: self.registry.clone(),
            index: self.index.clone(),
            store: self.store.clone(),
            backend: self.backend.clone(),
        }
    }
}

pub fn config(page_size: usize) -> FeedConfig {
    FeedConfig { page_size, ..FeedConfig::default() }
}

/// Lets spawned telemetry tasks run on the current-thread runtime.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
