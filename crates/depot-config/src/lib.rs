//! Configuration for depot.
//!
//! Configuration is read from a TOML file (see [`config::CONFIG_PATH_ENV`])
//! and then overridden by `DEPOT_BACKEND_*` environment variables. It is
//! loaded explicitly and passed by reference; nothing here is global.

pub mod config;
pub mod error;

pub use config::{BackendConfig, Config, LogConfig, TaskConfig};
pub use error::{ConfigError, Result};
