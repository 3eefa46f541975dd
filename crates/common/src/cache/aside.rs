//! Deduplicated cache-aside reads
//!
//! [`CacheAside::get`] fingerprints a logical key, serves a decodable stored
//! payload as a hit, and otherwise runs the caller's compute function and
//! writes the result back. Passing a dedup group collapses concurrent calls
//! for the same fingerprint into one execution of that whole body.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::{CacheAsideError, StoreError};
use super::store::ShardedStore;
use crate::clock::Clock;
use crate::sync::{AsyncCallGroup, CallGroup};
use crate::utils::{codec, Fingerprint};

/// Coalescing scope for blocking [`CacheAside::get`] calls
pub type DedupGroup<V, E> = CallGroup<Fingerprint, Result<V, CacheAsideError<E>>>;

/// Coalescing scope for [`CacheAside::get_async`] calls
pub type AsyncDedupGroup<V, E> = AsyncCallGroup<Fingerprint, Result<V, CacheAsideError<E>>>;

/// Expiring key/value store used behind [`CacheAside`]
///
/// Implementations must be safe for unsynchronised concurrent use.
pub trait ByteStore: Send + Sync {
    /// Look up a payload
    fn get(&self, fp: &Fingerprint) -> Option<Vec<u8>>;

    /// Store a payload under its fingerprint
    fn set(&self, fp: Fingerprint, payload: Vec<u8>) -> Result<(), StoreError>;

    /// Note a write that never reached the store
    fn record_rejected(&self) {}
}

impl<C: Clock> ByteStore for ShardedStore<C> {
    fn get(&self, fp: &Fingerprint) -> Option<Vec<u8>> {
        ShardedStore::get(self, fp)
    }

    fn set(&self, fp: Fingerprint, payload: Vec<u8>) -> Result<(), StoreError> {
        ShardedStore::set(self, fp, payload)
    }

    fn record_rejected(&self) {
        ShardedStore::record_rejected(self);
    }
}

impl<S: ByteStore + ?Sized> ByteStore for Arc<S> {
    fn get(&self, fp: &Fingerprint) -> Option<Vec<u8>> {
        (**self).get(fp)
    }

    fn set(&self, fp: Fingerprint, payload: Vec<u8>) -> Result<(), StoreError> {
        (**self).set(fp, payload)
    }

    fn record_rejected(&self) {
        (**self).record_rejected();
    }
}

/// Read-through cache over a [`ByteStore`]
///
/// # Examples
///
/// ```
/// use scaffold_common::cache::{CacheAside, DedupGroup, ShardedStore, StoreConfig};
///
/// let cache = CacheAside::new(ShardedStore::new(StoreConfig::default()).unwrap());
/// let group: DedupGroup<Vec<String>, String> = DedupGroup::new();
///
/// let tags = cache
///     .get(&("tags", 42), || Ok::<_, String>(vec!["rust".to_string()]), Some(&group))
///     .unwrap();
/// assert_eq!(tags, vec!["rust".to_string()]);
///
/// // Served from the store; the closure is never called.
/// let again: Vec<String> = cache.get(&("tags", 42), || Err("unreachable".to_string()), None).unwrap();
/// assert_eq!(again, tags);
/// ```
#[derive(Debug)]
pub struct CacheAside<S: ByteStore = ShardedStore> {
    store: S,
}

impl<S: ByteStore> CacheAside<S> {
    /// Wrap a backing store
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// A stored payload that does not decode as `V` counts as a miss. Compute
    /// errors are returned unchanged inside [`CacheAsideError::Compute`] and
    /// never cached. Failed writes are logged and otherwise ignored.
    ///
    /// With `group`, concurrent callers for the same key share one execution
    /// and all receive its result, error included. Both `V` and `E` must be
    /// `Clone` for that hand-off, and the bounds apply even when `group` is
    /// `None`; wrap a non-`Clone` error in an `Arc` to use it here.
    ///
    /// # Errors
    /// - [`CacheAsideError::Serialization`] if `key` cannot be encoded
    /// - [`CacheAsideError::Compute`] if `compute` fails
    pub fn get<K, V, E, F>(
        &self,
        key: &K,
        compute: F,
        group: Option<&DedupGroup<V, E>>,
    ) -> Result<V, CacheAsideError<E>>
    where
        K: Serialize + ?Sized,
        V: Serialize + DeserializeOwned + Clone,
        E: Clone,
        F: FnOnce() -> Result<V, E>,
    {
        let fp = Fingerprint::of(key).map_err(CacheAsideError::Serialization)?;
        match group {
            Some(group) => {
                let (result, shared) = group.run(fp, || self.load_or_compute(fp, compute));
                if shared {
                    debug!(fingerprint = %fp, "cache read coalesced with in-flight call");
                }
                result
            }
            None => self.load_or_compute(fp, compute),
        }
    }

    /// Async form of [`get`](Self::get) for futures-returning compute functions.
    ///
    /// Carries the same `Clone` bounds as [`get`](Self::get). Dropping the
    /// returned future (for example under `tokio::time::timeout`) releases
    /// its hold on the dedup group.
    pub async fn get_async<K, V, E, F, Fut>(
        &self,
        key: &K,
        compute: F,
        group: Option<&AsyncDedupGroup<V, E>>,
    ) -> Result<V, CacheAsideError<E>>
    where
        K: Serialize + ?Sized,
        V: Serialize + DeserializeOwned + Clone,
        E: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let fp = Fingerprint::of(key).map_err(CacheAsideError::Serialization)?;
        match group {
            Some(group) => {
                let (result, shared) =
                    group.run(fp, || self.load_or_compute_async(fp, compute)).await;
                if shared {
                    debug!(fingerprint = %fp, "cache read coalesced with in-flight call");
                }
                result
            }
            None => self.load_or_compute_async(fp, compute).await,
        }
    }

    fn load_or_compute<V, E, F>(&self, fp: Fingerprint, compute: F) -> Result<V, CacheAsideError<E>>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.lookup(&fp) {
            return Ok(value);
        }
        let value = compute().map_err(CacheAsideError::Compute)?;
        self.fill(fp, &value);
        Ok(value)
    }

    async fn load_or_compute_async<V, E, F, Fut>(
        &self,
        fp: Fingerprint,
        compute: F,
    ) -> Result<V, CacheAsideError<E>>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup(&fp) {
            return Ok(value);
        }
        let value = compute().await.map_err(CacheAsideError::Compute)?;
        self.fill(fp, &value);
        Ok(value)
    }

    fn lookup<V: DeserializeOwned>(&self, fp: &Fingerprint) -> Option<V> {
        let payload = self.store.get(fp)?;
        match codec::decode(&payload) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(fingerprint = %fp, error = %err, "stored payload did not decode, treating as miss");
                None
            }
        }
    }

    fn write<V: Serialize>(&self, fp: Fingerprint, value: &V) -> Result<(), StoreError> {
        let payload = codec::encode(value).map_err(StoreError::Encode)?;
        self.store.set(fp, payload)
    }

    /// Best-effort write-back of a computed value.
    fn fill<V: Serialize>(&self, fp: Fingerprint, value: &V) {
        if let Err(err) = self.write(fp, value) {
            // the store counts its own refusals
            if matches!(err, StoreError::Encode(_)) {
                self.store.record_rejected();
            }
            debug!(fingerprint = %fp, error = %err, "cache write skipped");
        }
    }
}
