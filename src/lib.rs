pub mod auth;
pub mod backend;
pub mod codec;
pub mod config;
pub mod content;
pub mod discovery;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod models;
pub mod openapi;
pub mod ownership;
pub mod paginator;
pub mod rate_limit; // in-memory rate limiting
pub mod reaction;
pub mod registry;
pub mod routes;
pub mod sessions;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use feed::{FeedConfig, FeedDeps, FeedEngine, FeedScope, FeedSnapshot, LoadOutcome};
pub use routes::{config, AppState};
