use super::{AsyncReplyHandler, FutureHandler};

/// Pending request awaiting its outcome
///
/// Completing a waiter through any of its methods is idempotent. Only the first call
/// has an effect and returns `true`, every subsequent call returns `false`.
pub enum ReplyWaiter<M> {
    /// Outcome is observed through a [`ReplyFuture`](super::ReplyFuture)
    Future(FutureHandler<M>),
    /// Outcome is passed to a callback
    Callback(AsyncReplyHandler<M>),
}

impl<M> ReplyWaiter<M> {
    /// Completes the waiter with a reply
    pub fn fulfill(&self, message: M) -> bool {
        match self {
            ReplyWaiter::Future(handler) => handler.fulfill(message),
            ReplyWaiter::Callback(handler) => handler.on_reply(message),
        }
    }

    /// Completes the waiter with a timeout
    pub fn timeout(&self) -> bool {
        match self {
            ReplyWaiter::Future(handler) => handler.timeout(),
            ReplyWaiter::Callback(handler) => handler.on_timeout(),
        }
    }

    /// Completes the waiter with a cancellation
    pub fn cancel(&self) -> bool {
        match self {
            ReplyWaiter::Future(handler) => handler.cancel(),
            ReplyWaiter::Callback(handler) => handler.on_cancel(),
        }
    }

    /// Whether the waiter is still awaiting its outcome
    pub fn is_pending(&self) -> bool {
        match self {
            ReplyWaiter::Future(handler) => handler.is_pending(),
            ReplyWaiter::Callback(handler) => handler.is_pending(),
        }
    }

    /// Short name of the variant, used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            ReplyWaiter::Future(_) => "future",
            ReplyWaiter::Callback(_) => "callback",
        }
    }
}

impl<M> From<FutureHandler<M>> for ReplyWaiter<M> {
    fn from(handler: FutureHandler<M>) -> Self {
        ReplyWaiter::Future(handler)
    }
}

impl<M> From<AsyncReplyHandler<M>> for ReplyWaiter<M> {
    fn from(handler: AsyncReplyHandler<M>) -> Self {
        ReplyWaiter::Callback(handler)
    }
}
