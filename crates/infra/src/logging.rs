//! Tracing subscriber setup
//!
//! `RUST_LOG` directives win over the configured default level.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{InfraError, InfraResult};

/// Install the global tracing subscriber
///
/// # Errors
/// - `InfraError::Config` if the configured level does not parse
/// - `InfraError::Logging` if a global subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> InfraResult<()> {
    let default_level = parse_level(&config.level)?;
    let env_filter =
        EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_filter(env_filter),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_filter(env_filter),
            )
            .try_init(),
    };

    result.map_err(|e| InfraError::Logging(e.to_string()))?;
    tracing::debug!(level = %default_level, format = ?config.format, "Logging initialised");
    Ok(())
}

fn parse_level(raw: &str) -> InfraResult<LevelFilter> {
    raw.trim()
        .parse::<LevelFilter>()
        .map_err(|_| InfraError::Config(format!("Invalid log level: {}", raw)))
}

#[cfg(test)]
mod tests {
    //! Unit tests for logging.
    use super::*;

    /// Validates level parsing.
    ///
    /// Assertions:
    /// - Names parse case-insensitively with surrounding whitespace.
    /// - Unknown names are `InfraError::Config`.
    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::OFF);
        assert!(matches!(parse_level("loud"), Err(InfraError::Config(_))));
    }

    /// Validates a bad level is rejected before any subscriber is installed.
    #[test]
    fn test_invalid_level_is_config_error() {
        let config = LoggingConfig { level: "chatty".to_string(), ..LoggingConfig::default() };
        assert!(matches!(init_logging(&config), Err(InfraError::Config(_))));
    }

    /// Validates a second global install fails with `InfraError::Logging`.
    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);

        assert!(matches!(init_logging(&config), Err(InfraError::Logging(_))));
    }
}
