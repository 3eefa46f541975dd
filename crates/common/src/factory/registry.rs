//! Registry storage and the double-checked creation path

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Boxed error returned by erased destroy functions
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Destroy function with its handle already captured
type ErasedDestroy = Box<dyn FnOnce() -> Result<(), BoxError> + Send + Sync>;

/// Registry key: the caller's key plus the handle type
type RegistryKey = (String, TypeId);

struct RegistryEntry {
    object: Arc<dyn Any + Send + Sync>,
    destroy: Option<ErasedDestroy>,
}

/// Outcome of a [`ResourceFactory::destroy`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    /// Entries removed from the registry
    pub released: usize,
    /// Destroy functions that returned an error
    pub failed: usize,
}

/// Process-wide keyed singleton registry
///
/// At most one handle is live per `(key, type)`; once stored it is never
/// replaced, only released by [`destroy`](Self::destroy). Lookups take the
/// shared lock. Creation takes the exclusive lock and re-checks the registry
/// before calling the creation function, so concurrent first use constructs
/// exactly once. Construction is serialised across all keys while the
/// exclusive lock is held.
pub struct ResourceFactory {
    entries: RwLock<HashMap<RegistryKey, RegistryEntry>>,
}

impl ResourceFactory {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Get the handle for `key`, creating it on first use.
    ///
    /// `create` receives the key and runs at most once per key for the life
    /// of the registry. A failed creation is not cached; the next call
    /// retries.
    ///
    /// # Errors
    /// Returns exactly the error produced by `create`.
    pub fn get<T, E, F>(&self, key: &str, create: F) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&str) -> Result<T, E>,
    {
        self.get_or_create(key, create, |_| None)
    }

    /// Like [`get`](Self::get), also registering a destroy function that
    /// [`destroy`](Self::destroy) runs against the handle.
    ///
    /// # Errors
    /// Returns exactly the error produced by `create`.
    pub fn get_with_destroy<T, E, F, D, DE>(
        &self,
        key: &str,
        create: F,
        destroy: D,
    ) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&str) -> Result<T, E>,
        D: FnOnce(&T) -> Result<(), DE> + Send + Sync + 'static,
        DE: Into<BoxError>,
    {
        self.get_or_create(key, create, move |handle: Arc<T>| {
            let erased: ErasedDestroy = Box::new(move || destroy(&handle).map_err(Into::into));
            Some(erased)
        })
    }

    /// Whether a handle of type `T` is registered under `key`
    pub fn contains<T: Send + Sync + 'static>(&self, key: &str) -> bool {
        self.entries.read().contains_key(&(key.to_string(), TypeId::of::<T>()))
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry holds no handles
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Release every handle and reset the registry.
    ///
    /// Each registered destroy function runs once. Failures are logged and
    /// counted but never stop the remaining entries from being released. The
    /// registry is empty and reusable afterwards; calling this on an empty
    /// registry does nothing.
    pub fn destroy(&self) -> TeardownSummary {
        let mut entries = self.entries.write();
        if entries.is_empty() {
            return TeardownSummary::default();
        }

        let mut summary = TeardownSummary::default();
        for ((key, _), entry) in entries.drain() {
            summary.released += 1;
            let Some(destroy) = entry.destroy else {
                continue;
            };
            if let Err(error) = destroy() {
                summary.failed += 1;
                warn!(key = %key, error = %error, "resource destroy failed");
            }
        }

        info!(released = summary.released, failed = summary.failed, "resource factory torn down");
        summary
    }

    fn lookup<T: Send + Sync + 'static>(
        entries: &HashMap<RegistryKey, RegistryEntry>,
        registry_key: &RegistryKey,
    ) -> Option<Arc<T>> {
        entries.get(registry_key).and_then(|entry| Arc::clone(&entry.object).downcast::<T>().ok())
    }

    fn get_or_create<T, E, F, W>(&self, key: &str, create: F, wrap_destroy: W) -> Result<Arc<T>, E>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&str) -> Result<T, E>,
        W: FnOnce(Arc<T>) -> Option<ErasedDestroy>,
    {
        let registry_key = (key.to_string(), TypeId::of::<T>());

        if let Some(handle) = Self::lookup::<T>(&self.entries.read(), &registry_key) {
            return Ok(handle);
        }

        let mut entries = self.entries.write();
        // Another caller may have created it while we waited for the lock
        if let Some(handle) = Self::lookup::<T>(&entries, &registry_key) {
            return Ok(handle);
        }

        let handle = match create(key) {
            Ok(object) => Arc::new(object),
            Err(error) => {
                debug!(key = %key, "resource creation failed, not cached");
                return Err(error);
            }
        };

        let destroy = wrap_destroy(Arc::clone(&handle));
        let object: Arc<dyn Any + Send + Sync> = handle.clone();
        entries.insert(registry_key, RegistryEntry { object, destroy });
        debug!(key = %key, resource = std::any::type_name::<T>(), "resource created");

        Ok(handle)
    }
}

impl Default for ResourceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFactory").field("entries", &self.len()).finish()
    }
}

impl Drop for ResourceFactory {
    fn drop(&mut self) {
        if !self.entries.get_mut().is_empty() {
            self.destroy();
        }
    }
}
