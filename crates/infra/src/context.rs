//! Application context
//!
//! Owns the process singletons (resource factory, default local cache) as
//! lazily-initialised fields instead of globals, so every test can build its
//! own independent context.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use scaffold_common::cache::{CacheAside, ShardedStore};
use scaffold_common::factory::{BoxError, ResourceFactory, TeardownSummary};

use crate::config::{self, AppConfig};
use crate::errors::InfraResult;

/// Shared application state
#[derive(Debug)]
pub struct AppContext {
    config: AppConfig,
    factory: OnceCell<ResourceFactory>,
    local_cache: OnceCell<CacheAside<ShardedStore>>,
}

impl AppContext {
    /// Create a context from an explicit configuration
    pub fn new(config: AppConfig) -> Self {
        Self { config, factory: OnceCell::new(), local_cache: OnceCell::new() }
    }

    /// Create a context from [`config::load`]
    ///
    /// # Errors
    /// Returns `InfraError::Config` if configuration loading fails.
    pub fn load() -> InfraResult<Self> {
        Ok(Self::new(config::load()?))
    }

    /// Configuration this context was built with
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Resource factory, created on first use
    pub fn factory(&self) -> &ResourceFactory {
        self.factory.get_or_init(ResourceFactory::new)
    }

    /// Default local cache, built from `config.cache` on first use
    ///
    /// # Errors
    /// Returns `InfraError::Common` if the store cannot be constructed. A
    /// failed attempt is not remembered; the next call tries again.
    pub fn local_cache(&self) -> InfraResult<&CacheAside<ShardedStore>> {
        self.local_cache.get_or_try_init(|| -> InfraResult<CacheAside<ShardedStore>> {
            let store = ShardedStore::new(self.config.cache.clone())?;
            tracing::info!(
                shards = self.config.cache.shards,
                life_window_ms =
                    u64::try_from(self.config.cache.life_window.as_millis()).unwrap_or(u64::MAX),
                "Local cache initialised"
            );
            Ok(CacheAside::new(store))
        })
    }

    /// Shared resource for `uri`, created once through the factory
    ///
    /// # Errors
    /// Returns whatever `create` returns; failures are not cached.
    pub fn resource<T, E, F, D, DE>(&self, uri: &str, create: F, destroy: D) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&str) -> Result<T, E>,
        D: FnOnce(&T) -> Result<(), DE> + Send + Sync + 'static,
        DE: Into<BoxError>,
    {
        self.factory().get_with_destroy(uri, create, destroy)
    }

    /// Release every factory resource
    ///
    /// The context stays usable; resources are rebuilt on demand.
    pub fn shutdown(&self) -> TeardownSummary {
        let summary = self.factory.get().map(ResourceFactory::destroy).unwrap_or_default();
        tracing::info!(
            released = summary.released,
            failed = summary.failed,
            "Application context shut down"
        );
        summary
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
