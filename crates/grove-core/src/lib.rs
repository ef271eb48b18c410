//! Core domain types and ports for Grove.
//!
//! Everything the engine needs to talk about groups, users and
//! memberships lives here, together with the traits implemented by the
//! storage, cache and event bus adapters.

pub mod cache;
pub mod error;
pub mod events;
pub mod identity;
pub mod models;
pub mod repository;

pub use error::{ErrorKind, GroveError, GroveResult};
pub use identity::{GroupKey, UserRef};
