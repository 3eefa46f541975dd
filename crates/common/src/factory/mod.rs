//! Keyed resource factory with idempotent creation and bulk teardown
//!
//! [`ResourceFactory`] hands out one shared handle per key (a connection URI,
//! a client profile, ...) and releases every handle in a single
//! [`ResourceFactory::destroy`] pass.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use scaffold_common::factory::ResourceFactory;
//!
//! struct Pool {
//!     uri: String,
//! }
//!
//! let factory = ResourceFactory::new();
//!
//! let first = factory
//!     .get_with_destroy(
//!         "postgres://localhost/app",
//!         |uri| Ok::<_, String>(Pool { uri: uri.to_string() }),
//!         |_pool: &Pool| Ok::<_, String>(()),
//!     )
//!     .unwrap();
//! let second = factory
//!     .get("postgres://localhost/app", |_| Err::<Pool, _>("not called".to_string()))
//!     .unwrap();
//!
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(second.uri, "postgres://localhost/app");
//!
//! let summary = factory.destroy();
//! assert_eq!(summary.released, 1);
//! assert!(factory.is_empty());
//! ```

mod registry;

pub use registry::{BoxError, ResourceFactory, TeardownSummary};
