//! Redis-backed cache using a deadpool connection pool.

use std::time::Duration;

use deadpool_redis::{Config, Pool, Runtime};
use grove_core::cache::Cache;
use grove_core::error::GroveResult;
use redis::AsyncCommands;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::CacheError;

/// Keys deleted per `DEL` round trip in [`Cache::flush_all`].
const DELETE_BATCH: usize = 100;

pub struct RedisCache {
    pool: Pool,
    key_prefix: String,
}

impl RedisCache {
    /// Build the pool. Connections are opened lazily on first use.
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let pool = Config::from_url(&config.redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Pool(e.to_string()))
    }
}

impl Cache for RedisCache {
    async fn get(&self, key: &str) -> GroveResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(CacheError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> GroveResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .set(key, value)
            .expire(key, ttl.as_secs().max(1) as i64)
            .query_async(&mut *conn)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }

    async fn del(&self, key: &str) -> GroveResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await.map_err(CacheError::from)?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> GroveResult<bool> {
        let mut conn = self.connection().await?;
        let found: bool = conn.exists(key).await.map_err(CacheError::from)?;
        Ok(found)
    }

    /// Delete every key under the configured prefix. Other tenants of the
    /// same Redis database are left alone.
    async fn flush_all(&self) -> GroveResult<()> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}*", self.key_prefix);

        let mut cursor = 0u64;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(DELETE_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(CacheError::from)?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        for chunk in keys.chunks(DELETE_BATCH) {
            let mut cmd = redis::cmd("DEL");
            for key in chunk {
                cmd.arg(key);
            }
            let deleted: usize = cmd.query_async(&mut *conn).await.map_err(CacheError::from)?;
            debug!(deleted, "Flushed cache keys");
        }
        Ok(())
    }
}
