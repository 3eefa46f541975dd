//! Store configuration types and builder patterns
//!
//! Every store characteristic is fixed at construction time: shard count,
//! life window, sweep interval, sizing hints and the hard memory cap.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

const MIB: usize = 1024 * 1024;

/// Ceiling on the per-shard preallocation; shards still grow past it on demand
const MAX_INITIAL_SHARD_CAPACITY: usize = 1 << 16;

/// Configuration for [`ShardedStore`](super::ShardedStore)
///
/// Durations are written as milliseconds in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of shards; must be a non-zero power of two
    pub shards: usize,

    /// Age after which an entry becomes evictable
    #[serde(with = "crate::utils::duration_millis")]
    pub life_window: Duration,

    /// Interval between background sweeps (zero disables the sweeper)
    #[serde(with = "crate::utils::duration_millis")]
    pub clean_window: Duration,

    /// Expected size of one entry in bytes, used only for initial sizing
    pub max_entry_size: usize,

    /// Expected number of entries alive within one life window
    pub max_entries_in_window: usize,

    /// Total cap in MiB, split evenly across shards (0 = unlimited)
    pub hard_max_cache_size_mb: usize,

    /// Log shard growth and evictions
    pub verbose: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shards: 2,
            life_window: Duration::from_secs(10),
            clean_window: Duration::from_secs(5),
            max_entry_size: 10 * 1024,
            max_entries_in_window: 10 * 1024,
            hard_max_cache_size_mb: 100,
            verbose: false,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Preset for short-lived entries that are swept at the same cadence
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use scaffold_common::cache::StoreConfig;
    ///
    /// let config = StoreConfig::with_life_window(Duration::from_secs(30));
    /// assert_eq!(config.clean_window, Duration::from_secs(30));
    /// ```
    pub fn with_life_window(life_window: Duration) -> Self {
        Self { life_window, clean_window: life_window, ..Self::default() }
    }

    /// Preset for a bounded store without a background sweeper
    ///
    /// Expired entries are still dropped on write and by
    /// [`cleanup_expired`](super::ShardedStore::cleanup_expired).
    pub fn bounded(hard_max_cache_size_mb: usize) -> Self {
        Self { hard_max_cache_size_mb, clean_window: Duration::ZERO, ..Self::default() }
    }

    /// Check construction invariants
    pub fn validate(&self) -> CommonResult<()> {
        if self.shards == 0 || !self.shards.is_power_of_two() {
            return Err(CommonError::validation_with_value(
                "shards",
                "shard count must be a non-zero power of two",
                self.shards.to_string(),
            ));
        }
        if self.life_window.is_zero() {
            return Err(CommonError::validation("life_window", "life window must be non-zero"));
        }
        Ok(())
    }

    /// Byte cap for one shard, `None` when unlimited
    pub fn shard_byte_limit(&self) -> Option<usize> {
        if self.hard_max_cache_size_mb == 0 {
            return None;
        }
        Some(self.hard_max_cache_size_mb.saturating_mul(MIB) / self.shards.max(1))
    }

    /// Initial entry capacity for one shard
    pub(crate) fn initial_shard_capacity(&self) -> usize {
        let by_count = self.max_entries_in_window / self.shards.max(1);
        let hint = match self.shard_byte_limit() {
            Some(limit) if self.max_entry_size > 0 => by_count.min(limit / self.max_entry_size),
            _ => by_count,
        };
        hint.min(MAX_INITIAL_SHARD_CAPACITY)
    }
}

/// Builder for StoreConfig with fluent API
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shard count
    pub fn shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    /// Set the life window
    pub fn life_window(mut self, duration: Duration) -> Self {
        self.config.life_window = duration;
        self
    }

    /// Set the sweep interval
    pub fn clean_window(mut self, duration: Duration) -> Self {
        self.config.clean_window = duration;
        self
    }

    /// Set the expected entry size
    pub fn max_entry_size(mut self, bytes: usize) -> Self {
        self.config.max_entry_size = bytes;
        self
    }

    /// Set the expected entry count per life window
    pub fn max_entries_in_window(mut self, entries: usize) -> Self {
        self.config.max_entries_in_window = entries;
        self
    }

    /// Set the hard memory cap in MiB
    pub fn hard_max_cache_size_mb(mut self, mb: usize) -> Self {
        self.config.hard_max_cache_size_mb = mb;
        self
    }

    /// Enable or disable verbose logging
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.config.verbose = enabled;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> CommonResult<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
