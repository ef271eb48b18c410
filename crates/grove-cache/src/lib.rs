//! Grove Cache: adapters for the [`grove_core::cache::Cache`] port.
//!
//! - [`RedisCache`]: pooled Redis client, used in deployments
//! - [`MemoryCache`]: process-local map with TTLs, used in tests and
//!   single-node development setups

mod config;
mod error;
mod memory;
mod redis_cache;

pub use config::CacheConfig;
pub use error::CacheError;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
