//! Process-local cache with per-entry expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use grove_core::cache::Cache;
use grove_core::error::GroveResult;
use tokio::time::Instant;

use crate::error::CacheError;

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
    failing: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Live (unexpired) keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, (_, expires_at))| *expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, (Vec<u8>, Instant)>) -> T,
    ) -> GroveResult<T> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable.into());
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Pool("cache lock poisoned".into()))?;
        Ok(f(&mut entries))
    }
}

impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> GroveResult<Option<Vec<u8>>> {
        let now = Instant::now();
        self.with_entries(|entries| match entries.get(key) {
            Some((value, expires_at)) if *expires_at > now => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        })
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> GroveResult<()> {
        let expires_at = Instant::now() + ttl;
        self.with_entries(|entries| {
            entries.insert(key.to_string(), (value, expires_at));
        })
    }

    async fn del(&self, key: &str) -> GroveResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }

    async fn exists(&self, key: &str) -> GroveResult<bool> {
        let now = Instant::now();
        self.with_entries(|entries| entries.get(key).is_some_and(|(_, exp)| *exp > now))
    }

    async fn flush_all(&self) -> GroveResult<()> {
        self.with_entries(|entries| entries.clear())
    }
}
