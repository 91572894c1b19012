use super::ReplyWaiter;
use crate::communication::CorrelationId;
use lru::LruCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, instrument, trace, warn};

struct CorrelationEntry<M> {
    waiter: Arc<ReplyWaiter<M>>,
    expires_at: Instant,
}

/// Concurrent map of pending requests with per-entry expiry
///
/// Backed by an [`LruCache`] capped at the configured pending request limit. The LRU functionality
/// itself is unimportant, lookups do not promote entries. What matters is the eviction of overflow:
/// once the limit is reached, registering another request cancels the oldest pending one. This caps
/// memory usage in case callers leak requests that never get a reply.
///
/// Expired entries are removed by [`CorrelationRegistry::purge`] which usually runs periodically
/// in a task started by [`CorrelationRegistry::spawn_purger`]. A timed out entry may thus linger for
/// at most one purge interval past its deadline.
pub struct CorrelationRegistry<M> {
    entries: Mutex<LruCache<CorrelationId, CorrelationEntry<M>>>,
    purge_poll_interval: Duration,
    timed_out: AtomicU64,
}

impl<M> CorrelationRegistry<M> {
    /// Creates an empty registry holding at most `capacity` pending requests
    pub fn new(capacity: usize, purge_poll_interval: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity.max(1))),
            purge_poll_interval: purge_poll_interval.max(Duration::from_millis(1)),
            timed_out: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CorrelationId, CorrelationEntry<M>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a waiter which expires once `timeout` passed
    ///
    /// Registering an id that is already present replaces the previous waiter, which is
    /// cancelled. The same happens to the oldest entry when the registry is full.
    pub fn put(&self, id: CorrelationId, waiter: impl Into<ReplyWaiter<M>>, timeout: Duration) {
        let waiter = Arc::new(waiter.into());
        let entry = CorrelationEntry {
            waiter,
            expires_at: Instant::now() + timeout,
        };

        let (replaced, evicted) = {
            let mut entries = self.lock();

            let evicted = if !entries.contains(&id) && entries.len() == entries.cap() {
                entries.pop_lru()
            } else {
                None
            };

            (entries.put(id.clone(), entry), evicted)
        };

        trace!(correlation_id = %id, ?timeout, "Registered pending request");

        if let Some(previous) = replaced {
            if previous.waiter.cancel() {
                warn!(correlation_id = %id, "Replaced pending request with the same correlation id");
            }
        }

        if let Some((evicted_id, evicted)) = evicted {
            if evicted.waiter.cancel() {
                warn!(correlation_id = %evicted_id, "Pending request limit reached, cancelled oldest request");
            }
        }
    }

    /// Looks up the waiter for the given id without removing it
    pub fn get(&self, id: &CorrelationId) -> Option<Arc<ReplyWaiter<M>>> {
        self.lock().peek(id).map(|entry| entry.waiter.clone())
    }

    /// Removes the waiter for the given id
    ///
    /// When called concurrently for the same id, exactly one caller receives the waiter.
    pub fn remove(&self, id: &CorrelationId) -> Option<Arc<ReplyWaiter<M>>> {
        self.lock().pop(id).map(|entry| entry.waiter)
    }

    /// Removes the entry for `id` only if it still holds the given waiter
    ///
    /// Guards against removing a waiter that has been registered under the same id in the meantime.
    pub fn remove_waiter(&self, id: &CorrelationId, waiter: &Arc<ReplyWaiter<M>>) -> bool {
        let mut entries = self.lock();

        let matches = entries
            .peek(id)
            .map(|entry| Arc::ptr_eq(&entry.waiter, waiter))
            .unwrap_or(false);

        if matches {
            entries.pop(id);
        }

        matches
    }

    /// Whether a waiter is registered for the given id
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.lock().contains(id)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no requests are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of pending requests
    pub fn capacity(&self) -> usize {
        self.lock().cap()
    }

    /// Ids of all pending requests, oldest first
    pub fn keys(&self) -> Vec<CorrelationId> {
        let mut keys: Vec<CorrelationId> = self.lock().iter().map(|(id, _)| id.clone()).collect();
        // LruCache iterates from most to least recently used
        keys.reverse();
        keys
    }

    /// Interval at which the purge task runs
    pub fn purge_poll_interval(&self) -> Duration {
        self.purge_poll_interval
    }

    /// Total number of waiters that have been timed out by purging
    pub fn timed_out_count(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Removes all expired entries and times out their waiters
    ///
    /// Waiters are notified after the registry lock has been released. Returns the number
    /// of waiters that actually transitioned into the timed out state; waiters that already
    /// completed otherwise are dropped silently.
    pub fn purge(&self) -> usize {
        let now = Instant::now();

        let expired: Vec<(CorrelationId, Arc<ReplyWaiter<M>>)> = {
            let mut entries = self.lock();

            let ids: Vec<CorrelationId> = entries
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(id, _)| id.clone())
                .collect();

            ids.into_iter()
                .filter_map(|id| entries.pop(&id).map(|entry| (id, entry.waiter)))
                .collect()
        };

        let mut timed_out = 0;

        for (id, waiter) in expired {
            if waiter.timeout() {
                trace!(correlation_id = %id, kind = waiter.kind(), "Pending request timed out");
                timed_out += 1;
            }
        }

        self.timed_out.fetch_add(timed_out as u64, Ordering::Relaxed);

        timed_out
    }
}

impl<M: Send + 'static> CorrelationRegistry<M> {
    /// Spawns a task which purges expired entries at the configured interval
    ///
    /// The task holds a reference to the registry and runs until the returned handle is
    /// cancelled or dropped. Must be called from within a tokio runtime.
    pub fn spawn_purger(self: &Arc<Self>) -> PurgeTask {
        let registry = self.clone();
        let handle = tokio::spawn(registry.purge_periodically());

        PurgeTask { handle }
    }

    #[instrument(name = "purger", skip(self), fields(interval = ?self.purge_poll_interval))]
    async fn purge_periodically(self: Arc<Self>) {
        let mut interval = time::interval(self.purge_poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let timed_out = self.purge();
            if timed_out > 0 {
                debug!(timed_out, pending = self.len(), "Purged expired requests");
            }
        }
    }
}

/// Handle of a running purge task, stops the task when dropped
#[derive(Debug)]
pub struct PurgeTask {
    handle: JoinHandle<()>,
}

impl PurgeTask {
    /// Stops the purge task
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for PurgeTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
