use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut hits = self.store.entry(key.to_string()).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }
        if hits.len() >= limit {
            return false;
        }
        hits.push_back(now);
        true
    }
}

/// Limits for the two write-ish actions: opening feeds and reacting.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub feed_limit: usize,
    pub feed_window: Duration,
    pub reaction_limit: usize,
    pub reaction_window: Duration,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize { std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }
        fn dur_env(name: &str, default: u64) -> Duration { Duration::from_secs(std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)) }
        Self {
            feed_limit: usize_env("RL_FEED_LIMIT", 30),
            feed_window: dur_env("RL_FEED_WINDOW", 60),
            reaction_limit: usize_env("RL_REACTION_LIMIT", 20),
            reaction_window: dur_env("RL_REACTION_WINDOW", 60),
        }
    }
}

#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }
    pub fn allow_feed(&self, client: &str) -> bool { self.limiter.check(&format!("feed:{client}"), self.cfg.feed_limit, self.cfg.feed_window) }
    pub fn allow_reaction(&self, principal: &str) -> bool { self.limiter.check(&format!("reaction:{principal}"), self.cfg.reaction_limit, self.cfg.reaction_window) }
}
