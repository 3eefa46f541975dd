//! Application configuration
//!
//! [`AppConfig`] groups the store settings and the logging settings. Every
//! field has a default, so partial files and partial environments are valid.

use serde::{Deserialize, Serialize};

pub use scaffold_common::cache::StoreConfig;

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local cache store settings
    pub cache: StoreConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset (`trace` .. `error`, or `off`)
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}
