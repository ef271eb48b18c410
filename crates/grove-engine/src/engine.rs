//! The engine facade: one instance of each service over shared
//! collaborators.

use std::sync::Arc;

use grove_auth::{AuthConfig, AuthorizationPolicy};
use grove_core::cache::Cache;
use grove_core::events::EventPublisher;
use grove_core::repository::GraphStore;

use crate::cache::CacheCoordinator;
use crate::config::EngineConfig;
use crate::directory::GroupDirectory;
use crate::membership::MembershipGraph;
use crate::roles::GroupRoles;

pub struct GroveEngine<S, C, P> {
    directory: GroupDirectory<S, C, P>,
    membership: MembershipGraph<S, C, P>,
    roles: GroupRoles<S, P>,
    cache: Arc<CacheCoordinator<C>>,
    policy: Arc<AuthorizationPolicy>,
}

impl<S, C, P> GroveEngine<S, C, P>
where
    S: GraphStore,
    C: Cache,
    P: EventPublisher,
{
    pub fn new(
        store: Arc<S>,
        cache: Arc<C>,
        publisher: Arc<P>,
        auth: AuthConfig,
        config: EngineConfig,
    ) -> Self {
        let cache = Arc::new(CacheCoordinator::new(
            cache,
            config.cache_key_prefix.clone(),
            config.cache_ttl,
        ));
        let policy = Arc::new(AuthorizationPolicy::new(auth));
        let config = Arc::new(config);

        Self {
            directory: GroupDirectory::new(
                store.clone(),
                cache.clone(),
                publisher.clone(),
                policy.clone(),
                config.clone(),
            ),
            membership: MembershipGraph::new(
                store.clone(),
                cache.clone(),
                publisher.clone(),
                policy.clone(),
                config.clone(),
            ),
            roles: GroupRoles::new(store, publisher, policy.clone(), config),
            cache,
            policy,
        }
    }

    pub fn directory(&self) -> &GroupDirectory<S, C, P> {
        &self.directory
    }

    pub fn membership(&self) -> &MembershipGraph<S, C, P> {
        &self.membership
    }

    pub fn roles(&self) -> &GroupRoles<S, P> {
        &self.roles
    }

    pub fn cache(&self) -> &CacheCoordinator<C> {
        &self.cache
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }
}
