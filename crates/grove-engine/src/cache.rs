//! Cache-aside coordination for group reads.
//!
//! Entries hold the expanded [`GroupTree`] of a group under
//! `{prefix}group:{id}:{oldId}:{digest}`, where the digest identifies
//! the expansion. Field projection happens after the cache, so each
//! group has at most [`Expansion::ALL`] entries. Cache failures are
//! logged and never fail the calling operation.

use std::sync::Arc;
use std::time::Duration;

use grove_core::cache::Cache;
use grove_core::error::GroveResult;
use grove_core::models::group::{Group, GroupTree};
use grove_core::models::membership::MemberRef;
use grove_core::repository::GraphRead;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::request::Expansion;
use crate::traversal;

/// First 16 hex characters of the SHA-256 of the expansion's canonical
/// criteria JSON.
pub fn criteria_digest(expansion: Expansion) -> String {
    let mut hasher = Sha256::new();
    hasher.update(expansion.criteria().to_string().as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

pub struct CacheCoordinator<C> {
    cache: Arc<C>,
    prefix: String,
    ttl: Duration,
}

impl<C: Cache> CacheCoordinator<C> {
    pub fn new(cache: Arc<C>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn key(&self, id: Uuid, old_id: &str, expansion: Expansion) -> String {
        format!(
            "{}group:{id}:{old_id}:{}",
            self.prefix,
            criteria_digest(expansion)
        )
    }

    /// Cached tree of `group`. Groups without a legacy id are never
    /// cached.
    pub async fn lookup(&self, group: &Group, expansion: Expansion) -> Option<GroupTree> {
        let old_id = group.legacy_id()?;
        let key = self.key(group.id, old_id, expansion);
        let bytes = match self.cache.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(tree) => {
                debug!(key = %key, "Cache hit");
                Some(tree)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                self.delete(&key).await;
                None
            }
        }
    }

    pub async fn store(&self, tree: &GroupTree, expansion: Expansion) {
        let Some(old_id) = tree.group.legacy_id() else {
            return;
        };
        let key = self.key(tree.group.id, old_id, expansion);
        let bytes = match serde_json::to_vec(tree) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache encode failed");
                return;
            }
        };
        if let Err(e) = self.cache.set(&key, bytes, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Delete every expansion variant of group `id` under each of the
    /// given legacy ids.
    pub async fn evict(&self, id: Uuid, old_ids: &[Option<&str>]) {
        let mut seen: Vec<&str> = Vec::new();
        for old_id in old_ids.iter().flatten().filter(|o| !o.is_empty()) {
            if seen.contains(old_id) {
                continue;
            }
            seen.push(*old_id);
            for expansion in Expansion::ALL {
                self.delete(&self.key(id, old_id, expansion)).await;
            }
        }
        debug!(group_id = %id, "Evicted cached group");
    }

    pub async fn evict_group(&self, group: &Group) {
        self.evict(group.id, &[group.legacy_id()]).await;
    }

    /// Evict `group` and every group above it, whose recursive sub-group
    /// trees embed it.
    pub async fn evict_with_ancestors<R: GraphRead>(
        &self,
        reader: &R,
        group: &Group,
        max_depth: usize,
    ) {
        self.evict_group(group).await;
        match traversal::ancestor_groups(reader, &MemberRef::Group(group.id), max_depth).await {
            Ok(ancestors) => self.evict_all(&ancestors).await,
            Err(e) => warn!(group_id = %group.id, error = %e, "Ancestor eviction failed"),
        }
    }

    pub async fn evict_all(&self, groups: &[Group]) {
        for group in groups {
            self.evict_group(group).await;
        }
    }

    /// Drop every entry under the cache's prefix.
    pub async fn flush_all(&self) -> GroveResult<()> {
        self.cache.flush_all().await
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.cache.del(key).await {
            warn!(key = %key, error = %e, "Cache delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digests_are_distinct_per_expansion() {
        let digests: Vec<String> = Expansion::ALL.into_iter().map(criteria_digest).collect();
        for (i, d) in digests.iter().enumerate() {
            assert_eq!(d.len(), 16);
            assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(!digests[i + 1..].contains(d));
        }
    }

    #[test]
    fn canonical_criteria_sort_keys() {
        let json = Expansion::SubGroups { one_level: true }.criteria().to_string();
        assert_eq!(
            json,
            r#"{"includeParentGroup":false,"includeSubGroups":true,"oneLevel":true}"#
        );
    }
}
