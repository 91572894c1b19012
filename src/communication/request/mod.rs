//! Sending requests and receiving their replies
//!
//! The [`Requestor`] is the entry point for request/reply interactions. It hands out
//! [`CorrelationId`](super::CorrelationId)s together with a way to observe the reply and routes
//! inbound replies, delivered through a [`ReplyDispatcher`], to the matching waiter.
//!
//! Sending the request itself is up to the caller, the requestor only provides the
//! [`reply destination`](Requestor::reply_destination) that has to be attached to it.

mod dispatcher;
mod error;
mod requestor;

pub use super::correlation::RequestError;
pub use dispatcher::{Dispatch, ReplyDispatcher, RequestorStats};
pub use error::RequestorError;
pub use requestor::{Requestor, RequestorState};
