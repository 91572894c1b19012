use super::{ReplyDispatcher, RequestorError, RequestorStats};
use crate::communication::correlation::{
    AsyncReplyHandler, CorrelationRegistry, FutureHandler, PurgeTask, ReplyFuture, ReplyOutcome,
};
use crate::communication::transport::{DestinationResolver, MessageListener, ReplyTransport};
use crate::communication::{CorrelationId, FailedToProcessResponse};
use crate::options::RequestorOptions;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument};

/// Lifecycle state of a [`Requestor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestorState {
    /// Constructed but not yet subscribed to the reply destination
    Created,
    /// Subscribed and purging expired requests
    Started,
    /// Shut down for good
    Stopped,
}

impl Display for RequestorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestorState::Created => "created",
            RequestorState::Started => "started",
            RequestorState::Stopped => "stopped",
        };

        f.write_str(name)
    }
}

enum Lifecycle<S> {
    Created,
    Started { subscription: S, purger: PurgeTask },
    Stopped,
}

impl<S> Lifecycle<S> {
    fn state(&self) -> RequestorState {
        match self {
            Lifecycle::Created => RequestorState::Created,
            Lifecycle::Started { .. } => RequestorState::Started,
            Lifecycle::Stopped => RequestorState::Stopped,
        }
    }
}

/// Correlates replies arriving on a reply destination with pending requests
///
/// Requests may be registered at any point in time, even before the requestor is started.
/// Replies are only received while it is started though, and expired requests are only
/// purged while started. Stopping the requestor does not fail pending requests; callers
/// blocking on a [`ReplyFuture`] are released by their own timeout.
///
/// ```ignore
/// let requestor = Requestor::new(broker.clone(), broker.clone(), RequestorOptions::default());
/// requestor.start().await?;
///
/// let destination = requestor.reply_destination().unwrap();
/// let (id, reply) = requestor.register_request(Duration::from_secs(5));
/// broker.send("service", Envelope::request(id, destination))?;
///
/// let response = reply.recv(Duration::from_secs(6)).await?;
/// ```
pub struct Requestor<T, R>
where
    T: ReplyTransport,
    R: DestinationResolver<Destination = T::Destination>,
{
    transport: T,
    resolver: R,
    options: RequestorOptions,
    dispatcher: Arc<ReplyDispatcher<T::Message>>,
    reply_destination: OnceCell<T::Destination>,
    lifecycle: Mutex<Lifecycle<T::Subscription>>,
}

impl<T, R> Requestor<T, R>
where
    T: ReplyTransport + Send + Sync,
    R: DestinationResolver<Destination = T::Destination> + Send + Sync,
{
    /// Creates a new requestor in the [`RequestorState::Created`] state
    pub fn new(transport: T, resolver: R, options: RequestorOptions) -> Self {
        let registry = Arc::new(CorrelationRegistry::new(
            options.pending_request_limit,
            options.request_map_purge_poll_interval,
        ));

        Self {
            transport,
            resolver,
            options,
            dispatcher: Arc::new(ReplyDispatcher::new(registry)),
            reply_destination: OnceCell::new(),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Options the requestor has been created with
    pub fn options(&self) -> &RequestorOptions {
        &self.options
    }

    /// Registry holding the pending requests
    pub fn registry(&self) -> &Arc<CorrelationRegistry<T::Message>> {
        self.dispatcher.registry()
    }

    /// Current lifecycle state
    pub async fn state(&self) -> RequestorState {
        self.lifecycle.lock().await.state()
    }

    /// Destination replies have to be sent to
    ///
    /// Available once the requestor has been started. Resolved exactly once and reused afterwards.
    pub fn reply_destination(&self) -> Option<T::Destination> {
        self.reply_destination.get().cloned()
    }

    /// Resolves the reply destination, subscribes to it and starts purging expired requests
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), RequestorError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if !matches!(*lifecycle, Lifecycle::Created) {
            return Err(RequestorError::InvalidState {
                operation: "start",
                state: lifecycle.state(),
            });
        }

        let destination = self
            .reply_destination
            .get_or_try_init(|| self.resolver.resolve_destination())
            .await
            .map_err(RequestorError::DestinationResolution)?
            .clone();

        debug!(?destination, "Resolved reply destination");

        let listener: Arc<dyn MessageListener<T::Message>> = self.dispatcher.clone();
        let subscription = self
            .transport
            .subscribe(&destination, self.options.subscription_client_id(), listener)
            .await
            .map_err(RequestorError::Subscription)?;

        let purger = self.registry().spawn_purger();

        *lifecycle = Lifecycle::Started {
            subscription,
            purger,
        };

        info!(?destination, "Requestor started");

        Ok(())
    }

    /// Stops purging and unsubscribes from the reply destination
    ///
    /// Stopping is terminal, a stopped requestor can not be started again. Calling this
    /// more than once has no effect.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), RequestorError> {
        let mut lifecycle = self.lifecycle.lock().await;

        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Started {
                subscription,
                purger,
            } => {
                purger.cancel();

                self.transport
                    .unsubscribe(subscription)
                    .await
                    .map_err(RequestorError::Unsubscribe)?;

                info!(pending = self.registry().len(), "Requestor stopped");
            }
            Lifecycle::Created => debug!("Stopped requestor that has never been started"),
            Lifecycle::Stopped => {}
        }

        Ok(())
    }

    /// Registers a request under a fresh id, to be observed through the returned future
    ///
    /// The request expires once `timeout` passed. Pass a somewhat larger timeout to the
    /// future (at least one purge interval more) to observe the expiry instead of a local timeout.
    pub fn register_request(&self, timeout: Duration) -> (CorrelationId, ReplyFuture<T::Message>) {
        let id = CorrelationId::generate();
        let future = self.receive_future(id.clone(), timeout);

        (id, future)
    }

    /// Same as [`Requestor::register_request`] using the configured default timeout
    pub fn register_request_default(&self) -> (CorrelationId, ReplyFuture<T::Message>) {
        self.register_request(self.options.request_timeout)
    }

    /// Registers a request under a caller supplied id
    ///
    /// A request that is still pending under the same id is cancelled.
    pub fn receive_future(&self, id: CorrelationId, timeout: Duration) -> ReplyFuture<T::Message> {
        let (handler, future) = FutureHandler::new();
        self.registry().put(id, handler, timeout);

        future
    }

    /// Registers a request under a fresh id whose outcome is passed to a callback
    pub fn register_async<F>(&self, timeout: Duration, callback: F) -> CorrelationId
    where
        F: FnOnce(ReplyOutcome<T::Message>) + Send + 'static,
    {
        let id = CorrelationId::generate();
        self.registry()
            .put(id.clone(), AsyncReplyHandler::new(callback), timeout);

        id
    }

    /// Withdraws a pending request. Returns whether a pending request has been cancelled.
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        self.registry()
            .remove(id)
            .map(|waiter| waiter.cancel())
            .unwrap_or(false)
    }

    /// Hands an inbound message to the waiter registered for its correlation id
    ///
    /// Usually called by the transport, exposed for transports that are not driven
    /// through a [`ReplyTransport`] subscription.
    pub fn on_message(&self, message: T::Message) -> Result<(), FailedToProcessResponse<T::Message>> {
        self.dispatcher.on_message(message)
    }

    /// Snapshot of the dispatch statistics
    pub fn stats(&self) -> RequestorStats {
        self.dispatcher.stats()
    }

    /// Number of currently pending requests
    pub fn pending_count(&self) -> usize {
        self.registry().len()
    }
}
