//! Engine configuration.

use std::time::Duration;

/// Topic names events are published under.
#[derive(Debug, Clone)]
pub struct EventTopics {
    pub group_create: String,
    pub group_update: String,
    pub group_delete: String,
    pub member_add: String,
    pub member_delete: String,
    pub subgroup_create: String,
    pub subgroup_delete: String,
    pub role_add: String,
    pub role_delete: String,
}

impl Default for EventTopics {
    fn default() -> Self {
        Self {
            group_create: "groups.notification.create".into(),
            group_update: "groups.notification.update".into(),
            group_delete: "groups.notification.delete".into(),
            member_add: "groups.notification.member.add".into(),
            member_delete: "groups.notification.member.delete".into(),
            subgroup_create: "groups.notification.subgroup.create".into(),
            subgroup_delete: "groups.notification.subgroup.delete".into(),
            role_add: "groups.notification.member.role.add".into(),
            role_delete: "groups.notification.member.role.delete".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on the number of layers any traversal expands
    /// (default: 32).
    pub max_traversal_depth: usize,
    /// Page size used when a caller does not give one (default: 20).
    pub default_per_page: u64,
    /// Lifetime of cached group reads (default: 24 hours).
    pub cache_ttl: Duration,
    /// Prefix of every cache key the engine writes (default: `grove:`).
    pub cache_key_prefix: String,
    pub topics: EventTopics,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_traversal_depth: 32,
            default_per_page: 20,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_key_prefix: "grove:".into(),
            topics: EventTopics::default(),
        }
    }
}
