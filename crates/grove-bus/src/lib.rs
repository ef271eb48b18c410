//! Grove Bus: publishers for the [`grove_core::events::EventPublisher`]
//! port.
//!
//! - [`BusApiPublisher`] posts events to an HTTP event bus wrapped in an
//!   [`EventEnvelope`]
//! - [`MemoryPublisher`] records events and can be told to fail, for tests

mod config;
mod envelope;
mod error;
mod http;
mod memory;

pub use config::BusConfig;
pub use envelope::EventEnvelope;
pub use error::BusError;
pub use http::BusApiPublisher;
pub use memory::{MemoryPublisher, PublishedEvent};
