//! Cache error types.

use grove_core::error::GroveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache backend unavailable")]
    Unavailable,
}

impl From<CacheError> for GroveError {
    fn from(err: CacheError) -> Self {
        GroveError::Cache(err.to_string())
    }
}
