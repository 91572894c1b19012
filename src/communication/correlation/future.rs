use super::RequestError;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

enum SlotState<M> {
    Pending,
    Replied(M),
    TimedOut,
    Cancelled,
    Taken,
}

impl<M> SlotState<M> {
    fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending)
    }

    /// Takes the outcome out of a completed slot, leaving pending slots untouched
    fn take_outcome(&mut self) -> Option<Result<M, RequestError>> {
        match mem::replace(self, SlotState::Taken) {
            SlotState::Pending => {
                *self = SlotState::Pending;
                None
            }
            SlotState::Replied(message) => Some(Ok(message)),
            SlotState::TimedOut => {
                *self = SlotState::TimedOut;
                Some(Err(RequestError::RequestTimeout))
            }
            // Taken is only observable after the single ReplyFuture has consumed the outcome
            SlotState::Cancelled | SlotState::Taken => {
                *self = SlotState::Cancelled;
                Some(Err(RequestError::Cancelled))
            }
        }
    }
}

/// Single-assignment cell shared between a [`FutureHandler`] and its [`ReplyFuture`]
struct ReplySlot<M> {
    state: Mutex<SlotState<M>>,
    condvar: Condvar,
    notify: Notify,
}

impl<M> ReplySlot<M> {
    fn lock(&self) -> MutexGuard<'_, SlotState<M>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, outcome: SlotState<M>) -> bool {
        {
            let mut state = self.lock();

            if !state.is_pending() {
                return false;
            }

            *state = outcome;
        }

        self.condvar.notify_all();
        // Stores a permit if the future is not currently being polled
        self.notify.notify_one();

        true
    }
}

/// Producer side of a future based waiter
///
/// Stored in the registry while the request is pending. The matching consumer side is
/// the [`ReplyFuture`] returned by [`FutureHandler::new`].
pub struct FutureHandler<M> {
    slot: Arc<ReplySlot<M>>,
}

impl<M> FutureHandler<M> {
    /// Creates a new pending handler and the future observing it
    pub fn new() -> (Self, ReplyFuture<M>) {
        let slot = Arc::new(ReplySlot {
            state: Mutex::new(SlotState::Pending),
            condvar: Condvar::new(),
            notify: Notify::new(),
        });

        (Self { slot: slot.clone() }, ReplyFuture { slot })
    }

    /// Completes the future with a reply. Returns whether this call completed it.
    pub fn fulfill(&self, message: M) -> bool {
        self.slot.complete(SlotState::Replied(message))
    }

    /// Completes the future with [`RequestError::RequestTimeout`]. Returns whether this call completed it.
    pub fn timeout(&self) -> bool {
        self.slot.complete(SlotState::TimedOut)
    }

    /// Completes the future with [`RequestError::Cancelled`]. Returns whether this call completed it.
    pub fn cancel(&self) -> bool {
        self.slot.complete(SlotState::Cancelled)
    }

    /// Whether the future is still waiting for its outcome
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_pending()
    }
}

/// Consumer side of a future based waiter
///
/// The outcome can be obtained either by blocking the current thread using [`ReplyFuture::wait`]
/// or from within an async context using [`ReplyFuture::recv`]. Both consume the future.
///
/// The timeout passed to either method is a local deadline of the caller. When it passes before
/// an outcome is known, the waiter is marked as timed out so that a late reply is discarded.
pub struct ReplyFuture<M> {
    slot: Arc<ReplySlot<M>>,
}

impl<M> ReplyFuture<M> {
    /// Whether the outcome is still unknown
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_pending()
    }

    /// Blocks the current thread until the outcome is known or the timeout passes
    ///
    /// Do not call this from within an async runtime worker thread, use [`ReplyFuture::recv`] instead.
    pub fn wait(self, timeout: Duration) -> Result<M, RequestError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.slot.lock();

        loop {
            if let Some(outcome) = state.take_outcome() {
                return outcome;
            }

            let now = Instant::now();
            if now >= deadline {
                *state = SlotState::TimedOut;
                return Err(RequestError::RequestTimeout);
            }

            state = match self.slot.condvar.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Waits asynchronously until the outcome is known or the timeout passes
    pub async fn recv(self, timeout: Duration) -> Result<M, RequestError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let outcome = self.slot.lock().take_outcome();
            if let Some(outcome) = outcome {
                return outcome;
            }

            let notified = self.slot.notify.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let mut state = self.slot.lock();

                return match state.take_outcome() {
                    Some(outcome) => outcome,
                    None => {
                        *state = SlotState::TimedOut;
                        Err(RequestError::RequestTimeout)
                    }
                };
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    const WAIT: Duration = Duration::from_millis(500);

    #[test]
    fn deliver_reply_to_blocked_thread() {
        let (handler, future) = FutureHandler::new();

        let waiting = thread::spawn(move || future.wait(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));

        assert!(handler.fulfill("reply"));
        assert_eq!(waiting.join().unwrap(), Ok("reply"));
    }

    #[test]
    fn return_immediately_when_already_completed() {
        let (handler, future) = FutureHandler::new();
        handler.fulfill(42);

        assert_eq!(future.wait(Duration::from_millis(0)), Ok(42));
    }

    #[test]
    fn complete_only_once() {
        let (handler, future) = FutureHandler::new();

        assert!(handler.timeout());
        assert!(!handler.fulfill(1));
        assert!(!handler.cancel());
        assert!(!handler.timeout());
        assert!(!handler.is_pending());

        assert_eq!(future.wait(WAIT), Err(RequestError::RequestTimeout));
    }

    #[test]
    fn report_cancellation() {
        let (handler, future) = FutureHandler::<()>::new();

        assert!(handler.cancel());
        assert_eq!(future.wait(WAIT), Err(RequestError::Cancelled));
    }

    #[test]
    fn time_out_locally_and_discard_late_reply() {
        let (handler, future) = FutureHandler::new();

        let started = Instant::now();
        assert_eq!(future.wait(Duration::from_millis(50)), Err(RequestError::RequestTimeout));
        assert!(started.elapsed() >= Duration::from_millis(50));

        assert!(!handler.fulfill("late"));
    }

    #[test]
    fn elect_exactly_one_winner_among_racing_completions() {
        for _ in 0..100 {
            let (handler, future) = FutureHandler::new();
            let handler = Arc::new(handler);

            let racers: Vec<_> = (0..4)
                .map(|i| {
                    let handler = handler.clone();
                    thread::spawn(move || {
                        if i % 2 == 0 {
                            handler.fulfill(i)
                        } else {
                            handler.timeout()
                        }
                    })
                })
                .collect();

            let winners = racers
                .into_iter()
                .map(|r| r.join().unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(winners, 1);
            assert!(!handler.is_pending());
            assert!(!future.is_pending());
        }
    }

    #[tokio::test]
    async fn deliver_reply_to_async_receiver() {
        let (handler, future) = FutureHandler::new();

        let receiving = tokio::spawn(future.recv(Duration::from_secs(5)));
        tokio::task::yield_now().await;

        assert!(handler.fulfill("reply"));
        assert_eq!(receiving.await.unwrap(), Ok("reply"));
    }

    #[tokio::test]
    async fn receive_reply_that_arrived_before_polling() {
        let (handler, future) = FutureHandler::new();
        handler.fulfill(7);

        assert_eq!(future.recv(Duration::from_millis(0)).await, Ok(7));
    }

    #[tokio::test]
    async fn time_out_async_receiver() {
        let (handler, future) = FutureHandler::<u8>::new();

        assert_eq!(
            future.recv(Duration::from_millis(30)).await,
            Err(RequestError::RequestTimeout)
        );
        assert!(!handler.is_pending());
        assert!(!handler.fulfill(1));
    }
}
