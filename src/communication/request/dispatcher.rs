use crate::communication::correlation::CorrelationRegistry;
use crate::communication::transport::MessageListener;
use crate::communication::{CorrelationId, FailedToProcessResponse, Message};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Result of dispatching a single inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Reply has been handed to its waiter
    Delivered(CorrelationId),
    /// Message carried no correlation id and has been dropped
    MissingCorrelationId,
    /// No pending request matched the id (anymore) and the message has been dropped
    ///
    /// Covers replies to unknown or already expired requests as well as duplicate replies.
    UnknownCorrelation(CorrelationId),
}

/// Snapshot of dispatch statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestorStats {
    /// Replies handed to their waiter
    pub delivered: u64,
    /// Requests that expired without a reply
    pub timed_out: u64,
    /// Messages without a correlation id
    pub malformed: u64,
    /// Messages for unknown, expired or already answered requests
    pub unknown_correlation: u64,
    /// Messages whose correlation id could not be read
    pub failed: u64,
    /// Currently pending requests
    pub pending: usize,
}

#[derive(Default)]
struct DispatchCounters {
    delivered: AtomicU64,
    malformed: AtomicU64,
    unknown_correlation: AtomicU64,
    failed: AtomicU64,
}

impl DispatchCounters {
    fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// [`MessageListener`] routing inbound replies to the waiters in a [`CorrelationRegistry`]
///
/// Safe to be called from any number of delivery workers concurrently.
pub struct ReplyDispatcher<M> {
    registry: Arc<CorrelationRegistry<M>>,
    counters: DispatchCounters,
}

impl<M: Message> ReplyDispatcher<M> {
    /// Creates a new dispatcher for the given registry
    pub fn new(registry: Arc<CorrelationRegistry<M>>) -> Self {
        Self {
            registry,
            counters: DispatchCounters::default(),
        }
    }

    /// Registry the dispatcher delivers to
    pub fn registry(&self) -> &Arc<CorrelationRegistry<M>> {
        &self.registry
    }

    /// Hands the message to the waiter registered for its correlation id
    ///
    /// Messages without a matching waiter are logged and dropped. Only a failure to read
    /// the correlation id is reported as an error, carrying the original message.
    pub fn dispatch(&self, message: M) -> Result<Dispatch, FailedToProcessResponse<M>> {
        let correlation_id = match message.correlation_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                DispatchCounters::increment(&self.counters.malformed);
                warn!(?message, "Dropping message without correlation id");
                return Ok(Dispatch::MissingCorrelationId);
            }
            Err(e) => {
                DispatchCounters::increment(&self.counters.failed);
                return Err(FailedToProcessResponse::new(message, e));
            }
        };

        let waiter = match self.registry.get(&correlation_id) {
            Some(waiter) => waiter,
            None => {
                DispatchCounters::increment(&self.counters.unknown_correlation);
                warn!(%correlation_id, ?message, "Dropping response for unknown correlation id");
                return Ok(Dispatch::UnknownCorrelation(correlation_id));
            }
        };

        // Removed before completion so that a woken caller never observes its own entry.
        // Completed waiters have no business remaining in the registry either way.
        self.registry.remove_waiter(&correlation_id, &waiter);
        let delivered = waiter.fulfill(message);

        if delivered {
            DispatchCounters::increment(&self.counters.delivered);
            trace!(%correlation_id, kind = waiter.kind(), "Delivered response");
            Ok(Dispatch::Delivered(correlation_id))
        } else {
            DispatchCounters::increment(&self.counters.unknown_correlation);
            warn!(%correlation_id, "Dropping response for request that already completed");
            Ok(Dispatch::UnknownCorrelation(correlation_id))
        }
    }

    /// Current statistics
    pub fn stats(&self) -> RequestorStats {
        RequestorStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            timed_out: self.registry.timed_out_count(),
            malformed: self.counters.malformed.load(Ordering::Relaxed),
            unknown_correlation: self.counters.unknown_correlation.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            pending: self.registry.len(),
        }
    }
}

impl<M: Message> MessageListener<M> for ReplyDispatcher<M> {
    fn on_message(&self, message: M) -> Result<(), FailedToProcessResponse<M>> {
        self.dispatch(message).map(|_| ())
    }
}
