//! Structures to correlate replies with the requests that caused them
//!
//! Request and response is built on top of a one-way transport. The requesting
//! side generates a [`CorrelationId`], registers a waiter for it and sends its request,
//! stamped with that id and a reply destination, through the transport. Whoever serves the
//! request sends its reply to the reply destination, carrying the same correlation id.
//!
//! The [`Requestor`](request::Requestor) subscribes to the reply destination and hands every
//! inbound message to the waiter registered for its id. Waiters which do not receive a reply
//! in time are evicted by a periodic sweep of the [`CorrelationRegistry`](correlation::CorrelationRegistry)
//! and notified of their timeout instead.
//!
//! Whichever of the two events reaches a waiter first wins, the other one is discarded. This
//! holds regardless of how many delivery workers the transport runs in parallel.

mod error;
mod message;

pub mod correlation;
pub mod implementation;
pub mod request;
pub mod transport;

pub use error::FailedToProcessResponse;
pub use message::{CorrelationId, Envelope, Message, ResponseLocation};
