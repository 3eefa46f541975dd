//! Async call coalescing
//!
//! Same contract as [`CallGroup`](super::CallGroup) for futures. Each in-flight
//! key owns a `tokio::sync::OnceCell`; the first future to initialise it does
//! the work and every other caller awaits the stored value. If the executing
//! future is dropped, one of the waiting callers runs its own closure instead;
//! if nobody is waiting, the key is detached so the group returns to idle.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

struct AsyncCall<T> {
    cell: OnceCell<T>,
    /// Callers that joined an existing call
    waiters: AtomicUsize,
    /// `run` futures still holding the call; changed only under the map lock
    active: AtomicUsize,
}

/// Releases a caller's hold on a call, detaching it once nobody is left
struct Participant<'a, K: Eq + Hash + Clone, T: Clone> {
    group: &'a AsyncCallGroup<K, T>,
    key: &'a K,
    call: &'a Arc<AsyncCall<T>>,
}

impl<K: Eq + Hash + Clone, T: Clone> Drop for Participant<'_, K, T> {
    fn drop(&mut self) {
        let mut calls = self.group.calls.lock();
        if self.call.active.fetch_sub(1, Ordering::AcqRel) == 1
            && calls.get(self.key).is_some_and(|current| Arc::ptr_eq(current, self.call))
        {
            calls.remove(self.key);
        }
    }
}

/// Coalesces concurrent async calls that share a key
///
/// # Examples
///
/// ```
/// use scaffold_common::sync::AsyncCallGroup;
///
/// #[tokio::main]
/// async fn main() {
///     let group: AsyncCallGroup<u64, String> = AsyncCallGroup::new();
///     let (value, shared) = group.run(7, || async { "profile-7".to_string() }).await;
///     assert_eq!(value, "profile-7");
///     assert!(!shared);
/// }
/// ```
pub struct AsyncCallGroup<K, T> {
    calls: Mutex<HashMap<K, Arc<AsyncCall<T>>>>,
}

impl<K, T> AsyncCallGroup<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Create an empty group
    pub fn new() -> Self {
        Self { calls: Mutex::new(HashMap::new()) }
    }

    /// Run `f` for `key`, or await the call already in flight for it.
    ///
    /// Returns the result and whether it was delivered to more than one
    /// caller.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> (T, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (call, joined) = {
            let mut calls = self.calls.lock();
            match calls.get(&key) {
                Some(call) => {
                    call.waiters.fetch_add(1, Ordering::AcqRel);
                    call.active.fetch_add(1, Ordering::AcqRel);
                    (Arc::clone(call), true)
                }
                None => {
                    let call = Arc::new(AsyncCall {
                        cell: OnceCell::new(),
                        waiters: AtomicUsize::new(0),
                        active: AtomicUsize::new(1),
                    });
                    calls.insert(key.clone(), Arc::clone(&call));
                    (call, false)
                }
            }
        };
        let _participant = Participant { group: self, key: &key, call: &call };

        let mut executed = false;
        let value = call
            .cell
            .get_or_init(|| {
                executed = true;
                f()
            })
            .await
            .clone();

        if executed {
            self.detach(&key, &call);
        }
        if !executed {
            return (value, true);
        }
        // A joiner that took over from a dropped leader counted itself.
        let others = call.waiters.load(Ordering::Acquire) - usize::from(joined);
        (value, others > 0)
    }

    /// Detach the in-flight call for `key`, if any
    pub fn forget(&self, key: &K) {
        self.calls.lock().remove(key);
    }

    /// Number of keys with a call in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn detach(&self, key: &K, call: &Arc<AsyncCall<T>>) {
        let mut calls = self.calls.lock();
        if calls.get(key).is_some_and(|current| Arc::ptr_eq(current, call)) {
            calls.remove(key);
        }
    }
}

impl<K, T> Default for AsyncCallGroup<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for AsyncCallGroup<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCallGroup").field("in_flight", &self.calls.lock().len()).finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for sync::async_call_group.
    use std::time::Duration;

    use super::*;

    /// Validates that concurrent same-key futures share one execution.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_calls_coalesce() {
        let group = Arc::new(AsyncCallGroup::<String, u64>::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let group = Arc::clone(&group);
                let executions = Arc::clone(&executions);
                tokio::spawn(async move {
                    group
                        .run("orders:page=1".to_string(), || async move {
                            executions.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            99
                        })
                        .await
                })
            })
            .collect();

        let mut values = Vec::new();
        for task in tasks {
            values.push(task.await.unwrap());
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|(value, _)| *value == 99));
        assert!(values.iter().all(|(_, shared)| *shared));
        assert_eq!(group.in_flight(), 0);
    }

    /// Validates that a dropped leader hands execution to a waiter.
    ///
    /// Assertions:
    /// - The cancelled leader never produces a value.
    /// - The waiter runs its own closure.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_leader_hands_over() {
        let group = Arc::new(AsyncCallGroup::<u8, u8>::new());

        let leader = {
            let group = Arc::clone(&group);
            tokio::spawn(async move {
                group
                    .run(1, || async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        1
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let waiter = {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.run(1, || async { 2 }).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        leader.abort();

        let (value, shared) = waiter.await.unwrap();
        assert_eq!(value, 2);
        assert!(!shared);
        assert_eq!(group.in_flight(), 0);
    }

    /// Validates that cancelled leaders with no waiters leave no entries.
    ///
    /// Assertions:
    /// - Aborting 100 leaders on distinct keys returns the group to idle.
    /// - A later call for one of those keys executes afresh.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancelled_leaders_release_their_keys() {
        let group = Arc::new(AsyncCallGroup::<u32, u32>::new());

        let leaders: Vec<_> = (0..100u32)
            .map(|key| {
                let group = Arc::clone(&group);
                tokio::spawn(async move {
                    group
                        .run(key, || async move {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            key
                        })
                        .await
                })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        for leader in leaders {
            leader.abort();
            assert!(leader.await.unwrap_err().is_cancelled());
        }

        assert_eq!(group.in_flight(), 0);
        assert_eq!(group.run(7, || async { 70 }).await, (70, false));
    }

    /// Validates that different keys run independently.
    #[tokio::test]
    async fn test_distinct_keys_execute_separately() {
        let group: AsyncCallGroup<u8, u8> = AsyncCallGroup::new();

        let (a, b) = tokio::join!(group.run(1, || async { 10 }), group.run(2, || async { 20 }));

        assert_eq!(a, (10, false));
        assert_eq!(b, (20, false));
    }
}
