use std::fmt::{self, Debug, Formatter};
use std::sync::{Mutex, PoisonError};

/// Outcome passed to the callback of an [`AsyncReplyHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome<M> {
    /// A reply arrived in time
    Reply(M),
    /// The request expired without a reply
    Timeout,
    /// The request was withdrawn or displaced
    Cancelled,
}

type Callback<M> = Box<dyn FnOnce(ReplyOutcome<M>) + Send>;

/// Callback based waiter
///
/// The callback is invoked exactly once with whatever happens first. It runs on the
/// thread that completed the waiter, i.e. a transport delivery worker for replies or the
/// purge task for timeouts, so it should not block for extended periods of time.
pub struct AsyncReplyHandler<M> {
    callback: Mutex<Option<Callback<M>>>,
}

impl<M> AsyncReplyHandler<M> {
    /// Wraps a callback
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(ReplyOutcome<M>) + Send + 'static,
    {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    /// Invokes the callback with a reply. Returns whether the callback has been invoked.
    pub fn on_reply(&self, message: M) -> bool {
        self.invoke(ReplyOutcome::Reply(message))
    }

    /// Invokes the callback with a timeout. Returns whether the callback has been invoked.
    pub fn on_timeout(&self) -> bool {
        self.invoke(ReplyOutcome::Timeout)
    }

    /// Invokes the callback with a cancellation. Returns whether the callback has been invoked.
    pub fn on_cancel(&self) -> bool {
        self.invoke(ReplyOutcome::Cancelled)
    }

    /// Whether the callback has yet to be invoked
    pub fn is_pending(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn invoke(&self, outcome: ReplyOutcome<M>) -> bool {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match callback {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }
}

impl<M> Debug for AsyncReplyHandler<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncReplyHandler")
            .field("pending", &self.is_pending())
            .finish()
    }
}
