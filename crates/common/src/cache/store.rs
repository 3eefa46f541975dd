//! Sharded expiring byte store
//!
//! Payloads are kept per shard in a hash map plus a FIFO queue of insertion
//! order. The queue drives both expiry (oldest first) and eviction under the
//! memory cap. Overwritten or removed keys leave stale queue slots behind;
//! they are skipped lazily and compacted when they pile up.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use tracing::debug;

use super::config::StoreConfig;
use super::error::StoreError;
use super::stats::{CacheStats, MetricsCollector};
use crate::clock::{Clock, SystemClock};
use crate::error::CommonResult;
use crate::utils::Fingerprint;

const SWEEPER_THREAD_NAME: &str = "cache-sweeper";

struct Entry {
    payload: Vec<u8>,
    stored_at: Instant,
    seq: u64,
}

struct Shard {
    entries: HashMap<Fingerprint, Entry>,
    order: VecDeque<(Fingerprint, u64)>,
    bytes: usize,
    next_seq: u64,
    capacity: usize,
}

impl Shard {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            bytes: 0,
            next_seq: 0,
            capacity,
        }
    }

    /// Insert a new entry; returns true if the shard outgrew its capacity.
    fn insert(&mut self, fp: Fingerprint, payload: Vec<u8>, now: Instant) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.bytes += payload.len();
        self.order.push_back((fp, seq));
        self.entries.insert(fp, Entry { payload, stored_at: now, seq });

        if self.order.len() > self.entries.len().saturating_mul(2) + 64 {
            self.compact();
        }
        if self.entries.len() > self.capacity {
            self.capacity = self.capacity.max(1).saturating_mul(2);
            return true;
        }
        false
    }

    fn remove(&mut self, fp: &Fingerprint) -> Option<Entry> {
        let entry = self.entries.remove(fp)?;
        self.bytes -= entry.payload.len();
        Some(entry)
    }

    fn is_current(&self, fp: &Fingerprint, seq: u64) -> bool {
        self.entries.get(fp).is_some_and(|entry| entry.seq == seq)
    }

    /// Drop stale queue slots from the front.
    fn skip_stale(&mut self) {
        while let Some(&(fp, seq)) = self.order.front() {
            if self.is_current(&fp, seq) {
                break;
            }
            self.order.pop_front();
        }
    }

    fn oldest(&mut self) -> Option<&Entry> {
        self.skip_stale();
        let (fp, _) = self.order.front()?;
        self.entries.get(fp)
    }

    fn pop_oldest(&mut self) -> Option<Entry> {
        self.skip_stale();
        let (fp, _) = self.order.pop_front()?;
        self.remove(&fp)
    }

    fn oldest_expired(&mut self, now: Instant, life_window: Duration) -> bool {
        self.oldest().is_some_and(|entry| now.saturating_duration_since(entry.stored_at) > life_window)
    }

    fn compact(&mut self) {
        let entries = &self.entries;
        self.order.retain(|(fp, seq)| entries.get(fp).is_some_and(|entry| entry.seq == *seq));
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.bytes = 0;
    }
}

/// State shared between the store handle and its sweeper thread
struct Inner<C> {
    shards: Vec<RwLock<Shard>>,
    config: StoreConfig,
    shard_limit: Option<usize>,
    metrics: MetricsCollector,
    clock: C,
}

impl<C: Clock> Inner<C> {
    fn shard(&self, fp: &Fingerprint) -> &RwLock<Shard> {
        // shard count is a power of two, checked by StoreConfig::validate
        let index = (fp.prefix_u64() as usize) & (self.shards.len() - 1);
        &self.shards[index]
    }

    fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.write();
            while shard.oldest_expired(now, self.config.life_window) {
                if shard.pop_oldest().is_none() {
                    break;
                }
                removed += 1;
            }
        }
        if removed > 0 {
            self.metrics.record_expirations(removed as u64);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }
}

struct Sweeper {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    fn spawn<C: Clock>(inner: Arc<Inner<C>>, interval: Duration) -> CommonResult<Self> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);

        let handle = thread::Builder::new().name(SWEEPER_THREAD_NAME.to_string()).spawn(move || {
            let (lock, cvar) = &*signal;
            let mut stopped = lock.lock();
            while !*stopped {
                let timed_out = cvar.wait_for(&mut stopped, interval).timed_out();
                if timed_out && !*stopped {
                    MutexGuard::unlocked(&mut stopped, || {
                        inner.cleanup_expired();
                    });
                }
            }
        })?;

        Ok(Self { stop, handle: Some(handle) })
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock() = true;
        cvar.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Concurrent byte store with time-based expiry and a hard memory cap
///
/// Keys are [`Fingerprint`]s; each one maps to a single shard guarded by its
/// own `RwLock`, so readers on different shards never contend.
///
/// Entries older than the life window become evictable. They remain readable
/// until the sweeper or a later write on the same shard removes them.
///
/// # Examples
///
/// ```
/// use scaffold_common::cache::{ShardedStore, StoreConfig};
/// use scaffold_common::utils::Fingerprint;
///
/// let store = ShardedStore::new(StoreConfig::default()).unwrap();
/// let fp = Fingerprint::of("greeting").unwrap();
///
/// store.set(fp, b"hello".to_vec()).unwrap();
/// assert_eq!(store.get(&fp), Some(b"hello".to_vec()));
/// ```
pub struct ShardedStore<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
    sweeper: Option<Sweeper>,
}

impl ShardedStore<SystemClock> {
    /// Create a store using the system clock
    pub fn new(config: StoreConfig) -> CommonResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ShardedStore<C> {
    /// Create a store with a custom clock (useful for testing)
    ///
    /// Spawns the background sweeper unless `clean_window` is zero.
    pub fn with_clock(config: StoreConfig, clock: C) -> CommonResult<Self> {
        config.validate()?;

        let capacity = config.initial_shard_capacity();
        let shards = (0..config.shards).map(|_| RwLock::new(Shard::with_capacity(capacity))).collect();
        let inner = Arc::new(Inner {
            shards,
            shard_limit: config.shard_byte_limit(),
            config,
            metrics: MetricsCollector::new(),
            clock,
        });

        let sweeper = if inner.config.clean_window.is_zero() {
            None
        } else {
            Some(Sweeper::spawn(Arc::clone(&inner), inner.config.clean_window)?)
        };

        debug!(
            shards = inner.config.shards,
            shard_capacity = capacity,
            shard_limit = ?inner.shard_limit,
            sweeper = sweeper.is_some(),
            "sharded store created"
        );

        Ok(Self { inner, sweeper })
    }

    /// Look up a payload
    pub fn get(&self, fp: &Fingerprint) -> Option<Vec<u8>> {
        let payload = self.inner.shard(fp).read().entries.get(fp).map(|entry| entry.payload.clone());
        match payload {
            Some(_) => self.inner.metrics.record_hit(),
            None => self.inner.metrics.record_miss(),
        }
        payload
    }

    /// Store a payload, replacing any previous one for the same fingerprint
    ///
    /// # Errors
    /// Returns [`StoreError::EntryTooLarge`] if the payload alone exceeds the
    /// per-shard cap.
    pub fn set(&self, fp: Fingerprint, payload: Vec<u8>) -> Result<(), StoreError> {
        let size = payload.len();
        if let Some(limit) = self.inner.shard_limit {
            if size > limit {
                self.inner.metrics.record_rejected();
                return Err(StoreError::EntryTooLarge { size, limit });
            }
        }

        let now = self.inner.clock.now();
        let mut shard = self.inner.shard(&fp).write();

        if shard.oldest_expired(now, self.inner.config.life_window) && shard.pop_oldest().is_some() {
            self.inner.metrics.record_expirations(1);
        }
        shard.remove(&fp);

        if let Some(limit) = self.inner.shard_limit {
            let mut evicted = 0u64;
            while shard.bytes + size > limit {
                if shard.pop_oldest().is_none() {
                    break;
                }
                evicted += 1;
            }
            if evicted > 0 {
                self.inner.metrics.record_evictions(evicted);
                if self.inner.config.verbose {
                    debug!(evicted, limit, "evicted oldest entries to stay under shard cap");
                }
            }
        }

        let grew = shard.insert(fp, payload, now);
        if grew && self.inner.config.verbose {
            debug!(capacity = shard.capacity, "cache shard grew");
        }
        self.inner.metrics.record_insert();
        Ok(())
    }

    /// Remove a payload; returns whether one was present
    pub fn remove(&self, fp: &Fingerprint) -> bool {
        self.inner.shard(fp).write().remove(fp).is_some()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().entries.len()).sum()
    }

    /// Check whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.shards.iter().all(|shard| shard.read().entries.is_empty())
    }

    /// Total payload bytes held
    pub fn size_bytes(&self) -> usize {
        self.inner.shards.iter().map(|shard| shard.read().bytes).sum()
    }

    /// Drop every entry
    pub fn clear(&self) {
        for shard in &self.inner.shards {
            shard.write().clear();
        }
    }

    /// Remove every entry past the life window; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        self.inner.cleanup_expired()
    }

    /// Snapshot of counters and current occupancy
    pub fn stats(&self) -> CacheStats {
        let (entries, bytes) = self.inner.shards.iter().fold((0, 0), |(entries, bytes), shard| {
            let shard = shard.read();
            (entries + shard.entries.len(), bytes + shard.bytes)
        });
        self.inner.metrics.snapshot(entries, bytes)
    }

    /// Construction-time configuration
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.metrics.record_rejected();
    }
}

impl<C: Clock> fmt::Debug for ShardedStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shards", &self.inner.config.shards)
            .field("entries", &self.len())
            .field("sweeper", &self.sweeper.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::store.
    use super::*;
    use crate::clock::MockClock;

    fn fp(n: u32) -> Fingerprint {
        Fingerprint::from_bytes(&n.to_le_bytes())
    }

    fn manual_config() -> StoreConfig {
        StoreConfig::builder()
            .shards(1)
            .life_window(Duration::from_secs(10))
            .clean_window(Duration::ZERO)
            .build()
            .unwrap()
    }

    /// Validates basic set, get and overwrite.
    ///
    /// Assertions:
    /// - Overwriting a key keeps a single entry and the latest payload.
    /// - `size_bytes` tracks the current payload only.
    #[test]
    fn test_set_get_overwrite() {
        let store = ShardedStore::with_clock(manual_config(), MockClock::new()).unwrap();

        store.set(fp(1), vec![1; 10]).unwrap();
        store.set(fp(1), vec![2; 4]).unwrap();

        assert_eq!(store.get(&fp(1)), Some(vec![2; 4]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.size_bytes(), 4);
        assert_eq!(store.get(&fp(2)), None);

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 2);
    }

    /// Validates that expired entries stay readable until swept.
    ///
    /// Assertions:
    /// - An entry past the life window is still returned by `get`.
    /// - `cleanup_expired` removes only expired entries.
    #[test]
    fn test_cleanup_expired_with_mock_clock() {
        let clock = MockClock::new();
        let store = ShardedStore::with_clock(manual_config(), clock.clone()).unwrap();

        store.set(fp(1), vec![1]).unwrap();
        clock.advance(Duration::from_secs(6));
        store.set(fp(2), vec![2]).unwrap();
        clock.advance(Duration::from_secs(5));

        assert_eq!(store.get(&fp(1)), Some(vec![1]));
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.get(&fp(1)), None);
        assert_eq!(store.get(&fp(2)), Some(vec![2]));
        assert_eq!(store.stats().expirations, 1);
    }

    /// Validates that a write drops the oldest expired entry of its shard.
    #[test]
    fn test_set_drops_oldest_expired_entry() {
        let clock = MockClock::new();
        let store = ShardedStore::with_clock(manual_config(), clock.clone()).unwrap();

        store.set(fp(1), vec![1]).unwrap();
        clock.advance(Duration::from_secs(11));
        store.set(fp(2), vec![2]).unwrap();

        assert_eq!(store.get(&fp(1)), None);
        assert_eq!(store.len(), 1);
    }

    /// Validates oldest-first eviction under the hard cap.
    ///
    /// Assertions:
    /// - Writing past the cap evicts the oldest entries first.
    /// - Oversized payloads are rejected with `EntryTooLarge`.
    #[test]
    fn test_hard_cap_evicts_oldest_and_rejects_oversize() {
        let config = StoreConfig::builder()
            .shards(1)
            .clean_window(Duration::ZERO)
            .hard_max_cache_size_mb(1)
            .build()
            .unwrap();
        let store = ShardedStore::with_clock(config, MockClock::new()).unwrap();
        let quarter = 256 * 1024;

        for n in 0..4 {
            store.set(fp(n), vec![0; quarter]).unwrap();
        }
        assert_eq!(store.len(), 4);

        store.set(fp(4), vec![0; quarter]).unwrap();
        assert_eq!(store.get(&fp(0)), None);
        assert!(store.get(&fp(1)).is_some());
        assert!(store.get(&fp(4)).is_some());
        assert!(store.size_bytes() <= 1024 * 1024);

        let err = store.set(fp(9), vec![0; 1024 * 1024 + 1]).unwrap_err();
        assert!(matches!(err, StoreError::EntryTooLarge { limit, .. } if limit == 1024 * 1024));

        let stats = store.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.rejected, 1);
    }

    /// Validates that overwrites leave no live stale slots behind.
    ///
    /// Assertions:
    /// - After many overwrites of one key, eviction still targets real entries.
    #[test]
    fn test_overwrites_do_not_confuse_eviction_order() {
        let config = StoreConfig::builder()
            .shards(1)
            .clean_window(Duration::ZERO)
            .hard_max_cache_size_mb(1)
            .build()
            .unwrap();
        let store = ShardedStore::with_clock(config, MockClock::new()).unwrap();
        let half = 512 * 1024;

        store.set(fp(1), vec![0; half]).unwrap();
        for _ in 0..200 {
            store.set(fp(2), vec![0; 16]).unwrap();
        }
        store.set(fp(3), vec![0; half]).unwrap();

        assert_eq!(store.get(&fp(1)), None);
        assert!(store.get(&fp(2)).is_some());
        assert!(store.get(&fp(3)).is_some());
    }

    /// Validates remove and clear.
    #[test]
    fn test_remove_and_clear() {
        let store = ShardedStore::with_clock(manual_config(), MockClock::new()).unwrap();
        store.set(fp(1), vec![1]).unwrap();
        store.set(fp(2), vec![2]).unwrap();

        assert!(store.remove(&fp(1)));
        assert!(!store.remove(&fp(1)));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.size_bytes(), 0);
    }

    /// Validates invalid configuration is refused at construction.
    #[test]
    fn test_new_rejects_invalid_config() {
        let config = StoreConfig { shards: 6, ..StoreConfig::default() };
        assert!(ShardedStore::new(config).is_err());
    }

    /// Validates an oversized entry hint still yields a working store.
    ///
    /// Assertions:
    /// - Construction succeeds for an unlimited store hinting `usize::MAX` entries.
    /// - The store accepts writes past the preallocated capacity.
    #[test]
    fn test_huge_entry_hint_does_not_overallocate() {
        let config = StoreConfig::builder()
            .shards(1)
            .clean_window(Duration::ZERO)
            .hard_max_cache_size_mb(0)
            .max_entries_in_window(usize::MAX)
            .build()
            .unwrap();
        let store = ShardedStore::with_clock(config, MockClock::new()).unwrap();

        for n in 0..1000 {
            store.set(fp(n), vec![1]).unwrap();
        }
        assert_eq!(store.len(), 1000);
    }

    /// Validates the background sweeper removes expired entries.
    ///
    /// Assertions:
    /// - With a 20ms life and clean window the entry is gone within a second.
    /// - Dropping the store joins the sweeper thread.
    #[test]
    fn test_background_sweeper() {
        let config = StoreConfig::with_life_window(Duration::from_millis(20));
        let store = ShardedStore::new(config).unwrap();
        store.set(fp(1), vec![1]).unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        while !store.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        assert!(store.is_empty());
        drop(store);
    }

    /// Validates keys spread over several shards.
    #[test]
    fn test_many_keys_across_shards() {
        let config = StoreConfig::builder().shards(8).clean_window(Duration::ZERO).build().unwrap();
        let store = ShardedStore::new(config).unwrap();

        for n in 0..256 {
            store.set(fp(n), n.to_le_bytes().to_vec()).unwrap();
        }

        assert_eq!(store.len(), 256);
        for n in 0..256 {
            assert_eq!(store.get(&fp(n)), Some(n.to_le_bytes().to_vec()));
        }
        let occupied = store.inner.shards.iter().filter(|shard| !shard.read().entries.is_empty()).count();
        assert!(occupied > 1);
    }
}
