use super::RequestorState;
use crate::BoxedError;
use thiserror::Error;

/// Error type for lifecycle operations of a [`Requestor`](super::Requestor)
#[derive(Error, Debug)]
pub enum RequestorError {
    /// Operation is not permitted in the current lifecycle state
    #[error("unable to {operation} requestor while it is {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// State the requestor was in
        state: RequestorState,
    },
    /// Reply destination could not be resolved
    #[error("unable to resolve reply destination")]
    DestinationResolution(#[source] BoxedError),
    /// Transport rejected the subscription to the reply destination
    #[error("unable to subscribe to reply destination")]
    Subscription(#[source] BoxedError),
    /// Transport failed to end the subscription
    #[error("unable to unsubscribe from reply destination")]
    Unsubscribe(#[source] BoxedError),
}
