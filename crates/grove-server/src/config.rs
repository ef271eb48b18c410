//! Application configuration assembled from `GROVE_*` environment
//! variables.

use std::str::FromStr;
use std::time::Duration;

use grove_auth::AuthConfig;
use grove_bus::BusConfig;
use grove_cache::CacheConfig;
use grove_db::DbConfig;
use grove_engine::EngineConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on a single health check (default: 3 seconds).
    pub health_check_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            health_check_timeout: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub cache: CacheConfig,
    pub bus: BusConfig,
    pub auth: AuthConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `lookup`; unset keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        set_string(&lookup, "GROVE_DB_URL", &mut config.db.url);
        set_string(&lookup, "GROVE_DB_NAMESPACE", &mut config.db.namespace);
        set_string(&lookup, "GROVE_DB_DATABASE", &mut config.db.database);
        set_string(&lookup, "GROVE_DB_USERNAME", &mut config.db.username);
        set_string(&lookup, "GROVE_DB_PASSWORD", &mut config.db.password);
        if let Some(ms) = parse::<u64>(&lookup, "GROVE_DB_CONNECT_TIMEOUT_MS")? {
            config.db.connect_timeout = Duration::from_millis(ms);
        }

        set_string(&lookup, "GROVE_REDIS_URL", &mut config.cache.redis_url);
        set_string(&lookup, "GROVE_CACHE_PREFIX", &mut config.cache.key_prefix);
        if let Some(secs) = parse::<u64>(&lookup, "GROVE_CACHE_TTL_SECS")? {
            config.cache.ttl = Duration::from_secs(secs);
        }

        set_string(&lookup, "GROVE_BUS_URL", &mut config.bus.url);
        set_string(&lookup, "GROVE_BUS_ORIGINATOR", &mut config.bus.originator);
        if let Some(ms) = parse::<u64>(&lookup, "GROVE_BUS_TIMEOUT_MS")? {
            config.bus.timeout = Duration::from_millis(ms);
        }
        if let Some(token) = lookup("GROVE_BUS_TOKEN").filter(|t| !t.is_empty()) {
            config.bus.auth_token = Some(token);
        }

        set_string(&lookup, "GROVE_ADMIN_ROLE", &mut config.auth.admin_role);
        if let Some(scopes) = lookup("GROVE_READ_SCOPES") {
            config.auth.read_scopes = split_list(&scopes);
        }
        if let Some(scopes) = lookup("GROVE_WRITE_SCOPES") {
            config.auth.write_scopes = split_list(&scopes);
        }

        if let Some(depth) = parse::<usize>(&lookup, "GROVE_MAX_TRAVERSAL_DEPTH")? {
            config.engine.max_traversal_depth = depth;
        }
        if let Some(per_page) = parse::<u64>(&lookup, "GROVE_DEFAULT_PER_PAGE")? {
            config.engine.default_per_page = per_page;
        }
        config.engine.cache_ttl = config.cache.ttl;
        config.engine.cache_key_prefix = config.cache.key_prefix.clone();

        if let Some(ms) = parse::<u64>(&lookup, "GROVE_HEALTH_CHECK_TIMEOUT_MS")? {
            config.server.health_check_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn set_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut String) {
    if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
        *target = value;
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.db.namespace, "grove");
        assert_eq!(config.engine.max_traversal_depth, 32);
        assert_eq!(config.server.health_check_timeout, Duration::from_secs(3));
        assert!(config.bus.auth_token.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GROVE_DB_URL", "db.internal:8000"),
            ("GROVE_CACHE_TTL_SECS", "60"),
            ("GROVE_CACHE_PREFIX", "groups:"),
            ("GROVE_BUS_TOKEN", "secret"),
            ("GROVE_WRITE_SCOPES", "write:groups, all:groups"),
            ("GROVE_DEFAULT_PER_PAGE", "50"),
            ("GROVE_DB_CONNECT_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();
        assert_eq!(config.db.url, "db.internal:8000");
        assert_eq!(config.engine.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.engine.cache_key_prefix, "groups:");
        assert_eq!(config.bus.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.auth.write_scopes, ["write:groups", "all:groups"]);
        assert_eq!(config.engine.default_per_page, 50);
        assert_eq!(config.db.connect_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("GROVE_MAX_TRAVERSAL_DEPTH", "deep")]))
            .unwrap_err();
        assert!(err.to_string().contains("GROVE_MAX_TRAVERSAL_DEPTH"));
    }
}
