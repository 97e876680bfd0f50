//! GHOST server
//!
//! The single HTTP surface over the host: the `/run` envelope route, the
//! fixed protocol routes, configuration loading, and graceful shutdown.

pub mod config;
pub mod routes;

pub use config::{load_config, ConfigError, ServerConfig};
pub use routes::{build_host, router, ServerState};
