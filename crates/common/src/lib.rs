//! Shared building blocks for Scaffold services.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, binary codec, fingerprints, serde helpers
//! - `runtime`: resource factory, call coalescing, sharded store, cache-aside
//! - `observability`: tracing events (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod clock;
#[cfg(feature = "runtime")]
pub mod factory;
#[cfg(feature = "runtime")]
pub mod sync;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{CacheAside, CacheAsideError, DedupGroup, ShardedStore, StoreConfig};
#[cfg(feature = "runtime")]
pub use clock::{Clock, MockClock, SystemClock};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use factory::{ResourceFactory, TeardownSummary};
#[cfg(feature = "foundation")]
pub use utils::serde::duration_millis;
#[cfg(feature = "foundation")]
pub use utils::Fingerprint;
