//! Infrastructure error type

use scaffold_common::CommonError;
use thiserror::Error;

/// Errors raised while wiring the application together
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result type alias for infrastructure operations
pub type InfraResult<T> = std::result::Result<T, InfraError>;
