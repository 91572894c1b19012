//! Bookkeeping of pending requests
//!
//! Every pending request is represented by a [`ReplyWaiter`] stored in the [`CorrelationRegistry`]
//! under its [`CorrelationId`](super::CorrelationId). Waiters come in two flavours:
//!
//! - [`FutureHandler`] hands out a [`ReplyFuture`] which can be blocked on or awaited
//! - [`AsyncReplyHandler`] invokes a callback once the outcome is known
//!
//! Both flavours transition from pending to completed exactly once. Every later attempt to
//! complete them is a no-op which reports `false`.

mod callback;
mod error;
mod future;
mod registry;
mod waiter;

pub use callback::{AsyncReplyHandler, ReplyOutcome};
pub use error::RequestError;
pub use future::{FutureHandler, ReplyFuture};
pub use registry::{CorrelationRegistry, PurgeTask};
pub use waiter::ReplyWaiter;
