//! Grove Server: configuration loading and application wiring.

pub mod app;
pub mod config;

pub use app::App;
pub use config::{AppConfig, ConfigError, ServerConfig};
