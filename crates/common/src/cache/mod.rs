//! Deduplicated read-through caching
//!
//! Two layers:
//!
//! - **[`ShardedStore`]**: a concurrent byte store keyed by [`Fingerprint`]
//!   with a life window, a background sweeper and a hard memory cap.
//! - **[`CacheAside`]**: fingerprints a logical key, serves decodable stored
//!   payloads, and otherwise runs the caller's compute function and writes
//!   the result back. An optional [`DedupGroup`] collapses concurrent
//!   identical calls into one execution.
//!
//! # Examples
//!
//! ## Read-through with coalescing
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use scaffold_common::cache::{CacheAside, DedupGroup, ShardedStore, StoreConfig};
//!
//! let cache = Arc::new(CacheAside::new(ShardedStore::new(StoreConfig::default()).unwrap()));
//! let group = Arc::new(DedupGroup::<u64, String>::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let cache = Arc::clone(&cache);
//!         let group = Arc::clone(&group);
//!         thread::spawn(move || cache.get("report:2024", || Ok(42), Some(&group)).unwrap())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), 42);
//! }
//! ```
//!
//! ## Store statistics
//! ```
//! use scaffold_common::cache::{ShardedStore, StoreConfig};
//! use scaffold_common::utils::Fingerprint;
//!
//! let store = ShardedStore::new(StoreConfig::bounded(16)).unwrap();
//! store.set(Fingerprint::of("a").unwrap(), vec![0; 128]).unwrap();
//! let _ = store.get(&Fingerprint::of("b").unwrap());
//!
//! let stats = store.stats();
//! assert_eq!(stats.entries, 1);
//! assert_eq!(stats.misses, 1);
//! ```
//!
//! [`Fingerprint`]: crate::utils::Fingerprint

mod aside;
mod config;
mod error;
mod stats;
mod store;

pub use aside::{AsyncDedupGroup, ByteStore, CacheAside, DedupGroup};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use error::{CacheAsideError, StoreError};
pub use stats::CacheStats;
pub use store::ShardedStore;
