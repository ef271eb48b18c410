//! Cache port: a byte-valued key/value store with per-key TTL.

use std::time::Duration;

use crate::error::GroveResult;

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = GroveResult<Option<Vec<u8>>>> + Send;
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = GroveResult<()>> + Send;
    fn del(&self, key: &str) -> impl Future<Output = GroveResult<()>> + Send;
    fn exists(&self, key: &str) -> impl Future<Output = GroveResult<bool>> + Send;
    fn flush_all(&self) -> impl Future<Output = GroveResult<()>> + Send;
}
