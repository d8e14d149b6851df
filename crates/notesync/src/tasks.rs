//! Single-slot cancellable timers.
//!
//! Each key owns at most one deferred task. Scheduling into an occupied slot
//! aborts the previous task first, so a burst of edits leaves exactly one
//! timer armed.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Keyed set of deferred tasks, one per key.
///
/// # Examples
///
/// ```
/// use notesync::tasks::DeferredTasks;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let tasks = DeferredTasks::new();
/// tasks.schedule("flush", Duration::from_secs(60), async {});
/// tasks.schedule("flush", Duration::from_secs(60), async {});
/// assert_eq!(tasks.pending_count(), 1);
///
/// tasks.cancel_all();
/// assert_eq!(tasks.pending_count(), 0);
/// # });
/// ```
#[derive(Debug)]
pub struct DeferredTasks<K: Eq + Hash> {
    slots: DashMap<K, JoinHandle<()>>,
}

impl<K: Eq + Hash> DeferredTasks<K> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Runs `task` after `delay`, replacing whatever was scheduled under `key`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: K, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });

        if let Some(previous) = self.slots.insert(key, handle) {
            previous.abort();
        }
    }

    /// Aborts the task under `key`, if any.
    pub fn cancel(&self, key: &K) {
        if let Some((_, handle)) = self.slots.remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&self) {
        self.slots.retain(|_, handle| {
            handle.abort();
            false
        });
    }

    /// True while the task under `key` has not yet finished.
    pub fn is_pending(&self, key: &K) -> bool {
        self.slots
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of tasks still running or waiting.
    pub fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .count()
    }
}

impl<K: Eq + Hash> Default for DeferredTasks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for DeferredTasks<K> {
    fn drop(&mut self) {
        for entry in self.slots.iter() {
            entry.value().abort();
        }
    }
}
