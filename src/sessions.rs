use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::feed::FeedEngine;

struct Session {
    engine: Arc<FeedEngine>,
    last_seen: Instant,
}

/// Live feed instances keyed by id. A session untouched for `ttl` is gone:
/// lookups treat it as missing and `purge_expired` frees it.
#[derive(Clone)]
pub struct FeedSessions {
    store: Arc<DashMap<Uuid, Session>>,
    ttl: Duration,
}

impl FeedSessions {
    pub fn new(ttl: Duration) -> Self {
        Self { store: Arc::new(DashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&self, id: Uuid, engine: Arc<FeedEngine>) {
        self.store.insert(id, Session { engine, last_seen: Instant::now() });
    }

    /// Returns the engine and refreshes its idle timer.
    pub fn get(&self, id: &Uuid) -> Option<Arc<FeedEngine>> {
        let now = Instant::now();
        let mut entry = self.store.get_mut(id)?;
        if now.duration_since(entry.last_seen) > self.ttl {
            drop(entry);
            self.store.remove_if(id, |_, s| now.duration_since(s.last_seen) > self.ttl);
            return None;
        }
        entry.last_seen = now;
        Some(entry.engine.clone())
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.store.remove(id).is_some()
    }

    /// Drops every idle session; returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, s| now.duration_since(s.last_seen) <= self.ttl);
        before.saturating_sub(self.store.len())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
