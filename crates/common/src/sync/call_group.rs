//! Blocking call coalescing
//!
//! The first caller for a key runs the closure; callers arriving with the same
//! key while it runs block until it settles and receive a clone of its result.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

enum Slot<T> {
    Pending,
    Done(T),
    /// The executing closure unwound before producing a value
    Abandoned,
}

struct Call<T> {
    slot: Mutex<Slot<T>>,
    settled: Condvar,
    waiters: AtomicUsize,
}

impl<T: Clone> Call<T> {
    fn new() -> Self {
        Self { slot: Mutex::new(Slot::Pending), settled: Condvar::new(), waiters: AtomicUsize::new(0) }
    }

    fn settle(&self, outcome: Slot<T>) {
        *self.slot.lock() = outcome;
        self.settled.notify_all();
    }

    /// Block until settled. `None` means the executing closure unwound.
    fn wait(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        loop {
            if let Slot::Done(value) = &*slot {
                return Some(value.clone());
            }
            if matches!(*slot, Slot::Abandoned) {
                return None;
            }
            self.settled.wait(&mut slot);
        }
    }
}

/// Coalesces concurrent calls that share a key
///
/// Only one closure per key is in flight at a time. Keys never block each
/// other beyond the short critical section on the call map.
///
/// # Examples
///
/// ```
/// use scaffold_common::sync::CallGroup;
///
/// let group: CallGroup<&str, u64> = CallGroup::new();
/// let (value, shared) = group.run("answer", || 42);
/// assert_eq!(value, 42);
/// assert!(!shared);
/// assert_eq!(group.in_flight(), 0);
/// ```
pub struct CallGroup<K, T> {
    calls: Mutex<HashMap<K, Arc<Call<T>>>>,
}

impl<K, T> CallGroup<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Create an empty group
    pub fn new() -> Self {
        Self { calls: Mutex::new(HashMap::new()) }
    }

    /// Run `f` for `key`, or wait for the call already in flight for it.
    ///
    /// Returns the result and whether it was delivered to more than one
    /// caller. If the executing closure panics, its waiters run their own
    /// closure instead of waiting forever.
    pub fn run<F>(&self, key: K, f: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.get(&key).cloned() {
            call.waiters.fetch_add(1, Ordering::AcqRel);
            drop(calls);
            return match call.wait() {
                Some(value) => (value, true),
                None => self.run(key, f),
            };
        }

        let call = Arc::new(Call::new());
        calls.insert(key.clone(), Arc::clone(&call));
        drop(calls);

        let mut guard = LeaderGuard { group: self, key: &key, call: &call, finished: false };
        let value = f();
        guard.finished = true;

        // After detaching, no new waiter can join, so the count is final
        self.detach(&key, &call);
        let shared = call.waiters.load(Ordering::Acquire) > 0;
        if shared {
            call.settle(Slot::Done(value.clone()));
        }
        (value, shared)
    }

    /// Detach the in-flight call for `key`, if any.
    ///
    /// Current waiters still receive its result; the next caller starts a
    /// fresh call.
    pub fn forget(&self, key: &K) {
        self.calls.lock().remove(key);
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn detach(&self, key: &K, call: &Arc<Call<T>>) {
        let mut calls = self.calls.lock();
        if calls.get(key).is_some_and(|current| Arc::ptr_eq(current, call)) {
            calls.remove(key);
        }
    }
}

impl<K, T> Default for CallGroup<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for CallGroup<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallGroup").field("in_flight", &self.calls.lock().len()).finish()
    }
}

/// Releases waiters if the leader's closure unwinds
struct LeaderGuard<'a, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    group: &'a CallGroup<K, T>,
    key: &'a K,
    call: &'a Arc<Call<T>>,
    finished: bool,
}

impl<K, T> Drop for LeaderGuard<'_, K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn drop(&mut self) {
        if !self.finished {
            self.group.detach(self.key, self.call);
            self.call.settle(Slot::Abandoned);
        }
    }
}
