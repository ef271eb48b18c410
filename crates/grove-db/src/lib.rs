//! Grove Database: graph store implementations.
//!
//! This crate provides:
//! - Opening the SurrealDB store ([`open_graph_store`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The SurrealDB graph store ([`repository::SurrealGraphStore`])
//! - A process-local graph store for tests and development
//!   ([`MemoryGraphStore`])
//! - Error types ([`DbError`])

mod connection;
mod error;
mod memory;
pub mod repository;
mod schema;

pub use connection::{DbConfig, open_graph_store};
pub use error::DbError;
pub use memory::{MemoryGraphStore, MemorySession, MemoryTx};
pub use schema::{run_migrations, schema_v1};
