//! Traits describing the one-way transport underneath the correlation machinery
//!
//! A transport has to provide a way to subscribe to a reply destination and deliver inbound
//! messages to a [`MessageListener`]. It may do so from any number of threads or tasks in parallel.
//! Where the reply destination comes from is up to a [`DestinationResolver`], most commonly a
//! temporary queue exclusive to the requesting process.

use super::{FailedToProcessResponse, Message};
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::error;

/// Consumer of inbound messages
///
/// Called by the transport for every message that arrives on a subscribed destination.
/// Implementations must be safe to call concurrently.
pub trait MessageListener<M: Message>: Send + Sync {
    /// Handles one inbound message
    ///
    /// Messages which can not be processed are handed back together with the cause so
    /// that the transport can route them to its error channel.
    fn on_message(&self, message: M) -> Result<(), FailedToProcessResponse<M>>;
}

/// Error channel of a transport
pub trait ExceptionListener<M: Message>: Send + Sync {
    /// Called with every message a [`MessageListener`] failed to process
    fn on_exception(&self, error: FailedToProcessResponse<M>);
}

impl<M, F> ExceptionListener<M> for F
where
    M: Message,
    F: Fn(FailedToProcessResponse<M>) + Send + Sync,
{
    fn on_exception(&self, error: FailedToProcessResponse<M>) {
        self(error)
    }
}

/// [`ExceptionListener`] which logs and drops failed messages
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingExceptionListener;

impl<M: Message> ExceptionListener<M> for LoggingExceptionListener {
    fn on_exception(&self, error: FailedToProcessResponse<M>) {
        let (message, cause) = error.into_parts();
        error!(?message, %cause, "Failed to process inbound message");
    }
}

/// Source of the destination replies should be sent to
#[async_trait]
pub trait DestinationResolver {
    /// Address type understood by the transport
    type Destination: Clone + Debug + Send + Sync;

    /// Resolves the reply destination
    ///
    /// Requestors call this exactly once and reuse the value for their entire lifetime.
    async fn resolve_destination(&self) -> Result<Self::Destination, BoxedError>;
}

/// Subscription side of a one-way messaging transport
#[async_trait]
pub trait ReplyTransport {
    /// Messages delivered by this transport
    type Message: Message;
    /// Address type understood by the transport
    type Destination: Clone + Debug + Send + Sync;
    /// Handle of an active subscription
    type Subscription: Send + Sync;

    /// Starts delivering messages arriving at `destination` to the listener
    ///
    /// The client id, if present, identifies the subscriber towards the transport.
    async fn subscribe(
        &self,
        destination: &Self::Destination,
        client_id: Option<String>,
        listener: Arc<dyn MessageListener<Self::Message>>,
    ) -> Result<Self::Subscription, BoxedError>;

    /// Stops delivering messages for the given subscription
    async fn unsubscribe(&self, subscription: Self::Subscription) -> EmptyResult;
}
