//! Grove Server: application entry point.

use std::sync::Arc;

use grove_bus::BusApiPublisher;
use grove_cache::RedisCache;
use grove_db::open_graph_store;
use grove_engine::GroveEngine;
use grove_server::{App, AppConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("grove=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting Grove server...");

    let config = AppConfig::from_env()?;

    let store = Arc::new(open_graph_store(&config.db).await?);
    let cache = Arc::new(RedisCache::new(&config.cache)?);
    let publisher = Arc::new(BusApiPublisher::new(config.bus.clone())?);
    let engine = Arc::new(GroveEngine::new(
        store,
        cache,
        publisher,
        config.auth.clone(),
        config.engine.clone(),
    ));

    let app = App::new(engine, config.server.clone());
    let checks = app.check_health().await?;
    tracing::info!(checks, "Grove engine ready");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Grove server stopped.");
    Ok(())
}
