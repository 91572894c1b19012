//! In-process transport based on tokio channels
//!
//! The [`MemoryBroker`] hosts named queues, each backed by an unbounded channel. A subscription
//! spawns a number of consumer tasks which share the receiving end of the queue and hand each
//! message to the subscribed [`MessageListener`](crate::communication::transport::MessageListener).
//! Messages are thus processed in parallel and in no particular order, which is what the
//! correlation machinery has to cope with on real brokers as well.
//!
//! Besides serving as a reference, the broker is handy for tests and for wiring up
//! services that live within the same process.

mod broker;

pub use broker::{MemoryBroker, MemorySubscription};

use thiserror::Error;

/// Error type of the in-process transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryTransportError {
    /// No queue with the given name exists
    #[error("queue {0} does not exist")]
    UnknownQueue(String),
    /// The queue already has a subscriber
    #[error("queue {0} already has an active subscription")]
    AlreadySubscribed(String),
}
