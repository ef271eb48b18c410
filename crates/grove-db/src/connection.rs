//! Opening the SurrealDB graph store.

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::repository::SurrealGraphStore;
use crate::schema::run_migrations;

/// Where the group graph lives and how to reach it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address (e.g., `127.0.0.1:8000`).
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Bound on establishing the WebSocket connection (default: 10 seconds).
    pub connect_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "grove".into(),
            database: "groups".into(),
            username: "root".into(),
            password: "root".into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Connect, select the graph's namespace and database, and bring the
/// schema up to date. The returned store is ready for engine use.
pub async fn open_graph_store(config: &DbConfig) -> Result<SurrealGraphStore<Client>, DbError> {
    info!(
        url = %config.url,
        namespace = %config.namespace,
        database = %config.database,
        "Opening graph store"
    );

    let db = tokio::time::timeout(config.connect_timeout, Surreal::new::<Ws>(&config.url))
        .await
        .map_err(|_| DbError::Unreachable {
            url: config.url.clone(),
        })??;

    db.signin(Root {
        username: config.username.clone(),
        password: config.password.clone(),
    })
    .await?;
    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await?;

    run_migrations(&db).await?;
    info!("Graph store ready");

    Ok(SurrealGraphStore::new(db))
}
