//! Event bus error types.

use grove_core::error::GroveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("bus rejected event on {topic}: HTTP {status}")]
    Rejected { topic: String, status: u16 },

    #[error("publisher configured to fail on {0}")]
    Injected(String),
}

impl From<BusError> for GroveError {
    fn from(err: BusError) -> Self {
        GroveError::Publish(err.to_string())
    }
}
