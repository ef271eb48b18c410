//! Domain models for Grove.
//!
//! These are the core types shared across all crates.

pub mod group;
pub mod membership;
pub mod user;
