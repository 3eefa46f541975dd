//! Cache boundary errors

use std::time::Duration;

use thiserror::Error;

use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Errors returned by a backing store write
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Payload is larger than one shard may hold
    #[error("entry of {size} bytes exceeds shard limit of {limit} bytes")]
    EntryTooLarge { size: usize, limit: usize },

    /// Value could not be encoded into a payload
    #[error("failed to encode cache payload: {0}")]
    Encode(#[source] CommonError),
}

/// Errors returned by [`CacheAside::get`](super::CacheAside::get)
///
/// Write failures never show up here; caching is best-effort.
#[derive(Debug, Clone, Error)]
pub enum CacheAsideError<E> {
    /// Logical key could not be encoded into a fingerprint
    #[error("failed to serialize cache key: {0}")]
    Serialization(#[source] CommonError),

    /// The caller's compute function failed
    #[error("{0}")]
    Compute(E),
}

impl<E> CacheAsideError<E> {
    /// The compute error, if this is one
    pub fn into_compute(self) -> Option<E> {
        match self {
            Self::Compute(err) => Some(err),
            Self::Serialization(_) => None,
        }
    }
}

impl ErrorClassification for StoreError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::EntryTooLarge { .. } => ErrorSeverity::Warning,
            Self::Encode(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl<E: ErrorClassification> ErrorClassification for CacheAsideError<E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Serialization(_) => false,
            Self::Compute(err) => err.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Serialization(err) => err.severity(),
            Self::Compute(err) => err.severity(),
        }
    }

    fn is_critical(&self) -> bool {
        match self {
            Self::Serialization(err) => err.is_critical(),
            Self::Compute(err) => err.is_critical(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Serialization(_) => None,
            Self::Compute(err) => err.retry_after(),
        }
    }
}
