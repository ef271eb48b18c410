//! The running application: an engine plus its health check.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use grove_core::cache::Cache;
use grove_core::error::{GroveError, GroveResult};
use grove_core::events::EventPublisher;
use grove_core::repository::GraphStore;
use grove_engine::GroveEngine;
use tracing::{debug, error};

use crate::config::ServerConfig;

pub struct App<S, C, P> {
    engine: Arc<GroveEngine<S, C, P>>,
    config: ServerConfig,
    checks_run: AtomicU64,
}

impl<S, C, P> App<S, C, P>
where
    S: GraphStore,
    C: Cache,
    P: EventPublisher,
{
    pub fn new(engine: Arc<GroveEngine<S, C, P>>, config: ServerConfig) -> Self {
        Self {
            engine,
            config,
            checks_run: AtomicU64::new(0),
        }
    }

    pub fn engine(&self) -> &GroveEngine<S, C, P> {
        &self.engine
    }

    /// Probe the graph store within the configured timeout. Returns the
    /// number of checks run so far, this one included.
    pub async fn check_health(&self) -> GroveResult<u64> {
        let checks = self.checks_run.fetch_add(1, Ordering::SeqCst) + 1;
        let probe = self.engine.directory().probe();
        match tokio::time::timeout(self.config.health_check_timeout, probe).await {
            Ok(Ok(groups)) => {
                debug!(checks, groups, "Health check passed");
                Ok(checks)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Health check failed");
                Err(GroveError::ServiceUnavailable(
                    "There is database operation error".into(),
                ))
            }
            Err(_) => {
                error!(
                    timeout_ms = self.config.health_check_timeout.as_millis() as u64,
                    "Health check timed out"
                );
                Err(GroveError::ServiceUnavailable(
                    "Database operation is slow".into(),
                ))
            }
        }
    }
}
