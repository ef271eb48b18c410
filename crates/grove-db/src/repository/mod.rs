//! SurrealDB repository implementations.

mod graph;

pub use graph::{SurrealGraphStore, SurrealSession, SurrealTx};
