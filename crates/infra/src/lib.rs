//! # Scaffold Infrastructure
//!
//! Application wiring around `scaffold-common`.
//!
//! This crate contains:
//! - Configuration loading (environment, then file, then defaults)
//! - Tracing subscriber setup
//! - [`AppContext`], which owns the lazily-created resource factory and the
//!   default local cache

pub mod config;
pub mod context;
pub mod errors;
pub mod logging;

// Re-export commonly used items
pub use config::{AppConfig, LogFormat, LoggingConfig};
pub use context::AppContext;
pub use errors::{InfraError, InfraResult};
pub use logging::init_logging;
