//! Grove Auth: actor context and authorization rules for graph
//! mutations and reads.
//!
//! Token decoding happens upstream; this crate only interprets the
//! resulting [`AuthContext`].

pub mod config;
pub mod context;
pub mod error;
pub mod policy;

pub use config::AuthConfig;
pub use context::{Actor, AuthContext};
pub use error::AuthError;
pub use policy::{Access, AuthorizationPolicy};
