//! Cache configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL (e.g., `redis://127.0.0.1:6379`).
    pub redis_url: String,
    /// Lifetime of cached group reads (default: 24 hours).
    pub ttl: Duration,
    /// Namespace prepended to every key and used by `flush_all`.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".into(),
            ttl: Duration::from_secs(24 * 3600),
            key_prefix: "grove:".into(),
        }
    }
}
