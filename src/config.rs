use std::time::Duration;

use crate::feed::FeedConfig;
use crate::rate_limit::RateLimitConfig;

/// Process configuration, read from the environment with defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway_url: String,
    pub registry_url: String,
    pub engagement_url: String,
    pub http_timeout: Duration,
    pub bind_addr: String,
    pub frontend_url: String,
    pub rate_limit_enabled: bool,
    pub rate_limits: RateLimitConfig,
    /// Idle time before an abandoned feed session is dropped.
    pub session_ttl: Duration,
    pub feed: FeedConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = FeedConfig::default();
        Self {
            gateway_url: env_or("ARWEAVE_GATEWAY_URL", "https://arweave.net"),
            registry_url: env_or("REGISTRY_URL", "http://localhost:4943/registry"),
            engagement_url: env_or("ENGAGEMENT_URL", "http://localhost:4943/engagement"),
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
            rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            rate_limits: RateLimitConfig::from_env(),
            session_ttl: Duration::from_secs(parse_env("FEED_SESSION_TTL_SECS", 1800).max(1)),
            feed: FeedConfig {
                app_name: env_or("APP_NAME", &defaults.app_name),
                page_size: parse_env("FEED_PAGE_SIZE", defaults.page_size).max(1),
                registry_batch_size: parse_env("REGISTRY_BATCH_SIZE", defaults.registry_batch_size).max(1),
            },
        }
    }
}

/// Required variables and their constraints; returns the list of problems.
pub fn validate_env() -> Vec<String> {
    let mut problems = Vec::new();
    match std::env::var("JWT_SECRET") {
        Err(_) => problems.push("JWT_SECRET is not set".to_string()),
        Ok(s) if s.len() < 32 => problems.push("JWT_SECRET must be at least 32 characters long".to_string()),
        Ok(_) => {}
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn defaults_and_overrides() {
        std::env::remove_var("APP_NAME");
        std::env::set_var("FEED_PAGE_SIZE", "0");
        std::env::set_var("REGISTRY_BATCH_SIZE", "nope");
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.feed.app_name, "Dialectica");
        assert_eq!(cfg.feed.page_size, 1);
        assert_eq!(cfg.feed.registry_batch_size, 100);
        std::env::remove_var("FEED_PAGE_SIZE");
        std::env::remove_var("REGISTRY_BATCH_SIZE");
    }

    #[test]
    #[serial_test::serial]
    fn short_secret_is_reported() {
        std::env::set_var("JWT_SECRET", "short");
        assert_eq!(validate_env().len(), 1);
        std::env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        assert!(validate_env().is_empty());
    }
}
