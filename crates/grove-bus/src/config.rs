//! Event bus configuration.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Endpoint events are POSTed to.
    pub url: String,
    /// Value of the envelope's `originator` field.
    pub originator: String,
    /// Per-request timeout (default: 10 seconds).
    pub timeout: Duration,
    /// Bearer token sent with every request, if the bus requires one.
    pub auth_token: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000/v5/bus/events".into(),
            originator: "grove-groups-api".into(),
            timeout: Duration::from_secs(10),
            auth_token: None,
        }
    }
}
