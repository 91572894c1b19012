use super::MemoryTransportError;
use crate::communication::transport::{
    DestinationResolver, ExceptionListener, LoggingExceptionListener, MessageListener,
    ReplyTransport,
};
use crate::communication::{Message, ResponseLocation};
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

/// Prefix of queue names created by [`MemoryBroker::create_temporary_queue`]
const TEMPORARY_QUEUE_PREFIX: &str = "temporary/";

type SharedReceiver<M> = Arc<Mutex<mpsc::UnboundedReceiver<M>>>;

struct Queue<M> {
    sender: mpsc::UnboundedSender<M>,
    receiver: SharedReceiver<M>,
    subscribed: bool,
}

impl<M> Queue<M> {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            subscribed: false,
        }
    }
}

struct BrokerInner<M> {
    queues: std::sync::Mutex<HashMap<ResponseLocation, Queue<M>>>,
    concurrent_consumers: usize,
    exception_listener: Arc<dyn ExceptionListener<M>>,
}

impl<M> BrokerInner<M> {
    fn queues(&self) -> MutexGuard<'_, HashMap<ResponseLocation, Queue<M>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process message broker
///
/// Cloning is cheap and yields a handle to the same set of queues. Acts as the
/// [`ReplyTransport`] and, by handing out temporary queues, as the [`DestinationResolver`].
pub struct MemoryBroker<M> {
    inner: Arc<BrokerInner<M>>,
}

impl<M> Clone for MemoryBroker<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Active subscription to a queue of a [`MemoryBroker`]
#[derive(Debug)]
pub struct MemorySubscription {
    queue: ResponseLocation,
    client_id: Option<String>,
    workers: Vec<JoinHandle<()>>,
}

impl MemorySubscription {
    /// Name of the subscribed queue
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Client id the subscription has been made with
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

impl<M: Message> MemoryBroker<M> {
    /// Creates a broker delivering through `concurrent_consumers` tasks per subscription
    ///
    /// Messages that fail to be processed are logged.
    pub fn new(concurrent_consumers: usize) -> Self {
        Self::with_exception_listener(concurrent_consumers, LoggingExceptionListener)
    }

    /// Creates a broker which routes messages that failed to be processed to the given listener
    pub fn with_exception_listener<L>(concurrent_consumers: usize, exception_listener: L) -> Self
    where
        L: ExceptionListener<M> + 'static,
    {
        Self {
            inner: Arc::new(BrokerInner {
                queues: std::sync::Mutex::new(HashMap::new()),
                concurrent_consumers: concurrent_consumers.max(1),
                exception_listener: Arc::new(exception_listener),
            }),
        }
    }

    /// Creates a named queue unless it already exists
    pub fn create_queue(&self, name: impl Into<ResponseLocation>) -> ResponseLocation {
        let name = name.into();
        self.inner
            .queues()
            .entry(name.clone())
            .or_insert_with(Queue::new);

        name
    }

    /// Creates a queue with a unique, random name
    pub fn create_temporary_queue(&self) -> ResponseLocation {
        let name = format!("{}{}", TEMPORARY_QUEUE_PREFIX, Uuid::new_v4());
        trace!(queue = %name, "Creating temporary queue");
        self.create_queue(name)
    }

    /// Removes a queue, discarding messages that have not been consumed yet
    ///
    /// Consumers of the queue stop once they drained the messages already buffered.
    pub fn delete_queue(&self, name: &str) -> bool {
        self.inner.queues().remove(name).is_some()
    }

    /// Whether a queue with the given name exists
    pub fn has_queue(&self, name: &str) -> bool {
        self.inner.queues().contains_key(name)
    }

    /// Publishes a message to a queue
    pub fn send(&self, destination: &str, message: M) -> Result<(), MemoryTransportError> {
        let queues = self.inner.queues();
        let queue = queues
            .get(destination)
            .ok_or_else(|| MemoryTransportError::UnknownQueue(destination.to_owned()))?;

        trace!(queue = destination, ?message, "Sending message");

        // The receiving half lives as long as the queue does
        queue
            .sender
            .send(message)
            .map_err(|_| MemoryTransportError::UnknownQueue(destination.to_owned()))
    }
}

async fn consume<M: Message>(
    worker: usize,
    receiver: SharedReceiver<M>,
    listener: Arc<dyn MessageListener<M>>,
    exception_listener: Arc<dyn ExceptionListener<M>>,
) {
    loop {
        let message = receiver.lock().await.recv().await;

        match message {
            Some(message) => {
                if let Err(e) = listener.on_message(message) {
                    exception_listener.on_exception(e);
                }
            }
            None => break,
        }
    }

    trace!(worker, "Queue closed, stopping consumer");
}

#[async_trait]
impl<M: Message> ReplyTransport for MemoryBroker<M> {
    type Message = M;
    type Destination = ResponseLocation;
    type Subscription = MemorySubscription;

    async fn subscribe(
        &self,
        destination: &ResponseLocation,
        client_id: Option<String>,
        listener: Arc<dyn MessageListener<M>>,
    ) -> Result<MemorySubscription, BoxedError> {
        let receiver = {
            let mut queues = self.inner.queues();
            let queue = queues
                .get_mut(destination)
                .ok_or_else(|| MemoryTransportError::UnknownQueue(destination.clone()))?;

            if queue.subscribed {
                return Err(MemoryTransportError::AlreadySubscribed(destination.clone()).into());
            }

            queue.subscribed = true;
            queue.receiver.clone()
        };

        let workers = (0..self.inner.concurrent_consumers)
            .map(|worker| {
                tokio::spawn(consume(
                    worker,
                    receiver.clone(),
                    listener.clone(),
                    self.inner.exception_listener.clone(),
                ))
            })
            .collect();

        debug!(queue = %destination, ?client_id, consumers = self.inner.concurrent_consumers, "Subscribed to queue");

        Ok(MemorySubscription {
            queue: destination.clone(),
            client_id,
            workers,
        })
    }

    async fn unsubscribe(&self, subscription: MemorySubscription) -> EmptyResult {
        for worker in &subscription.workers {
            worker.abort();
        }

        // Wait for the consumers to wind down so no message is delivered after returning
        join_all(subscription.workers).await;

        if let Some(queue) = self.inner.queues().get_mut(&subscription.queue) {
            queue.subscribed = false;
        }

        debug!(queue = %subscription.queue, "Unsubscribed from queue");

        Ok(())
    }
}

#[async_trait]
impl<M: Message> DestinationResolver for MemoryBroker<M> {
    type Destination = ResponseLocation;

    async fn resolve_destination(&self) -> Result<ResponseLocation, BoxedError> {
        Ok(self.create_temporary_queue())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::communication::{CorrelationId, Envelope, FailedToProcessResponse};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Forward(mpsc::UnboundedSender<Envelope>);

    impl MessageListener<Envelope> for Forward {
        fn on_message(&self, message: Envelope) -> Result<(), FailedToProcessResponse<Envelope>> {
            self.0.send(message).ok();
            Ok(())
        }
    }

    struct Reject;

    impl MessageListener<Envelope> for Reject {
        fn on_message(&self, message: Envelope) -> Result<(), FailedToProcessResponse<Envelope>> {
            Err(FailedToProcessResponse::new(message, "rejected".into()))
        }
    }

    fn forward() -> (Arc<dyn MessageListener<Envelope>>, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Forward(tx)), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Envelope {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn create_unique_temporary_queues() {
        let broker = MemoryBroker::<Envelope>::new(1);

        let a = broker.resolve_destination().await.unwrap();
        let b = broker.resolve_destination().await.unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with(TEMPORARY_QUEUE_PREFIX));
        assert!(broker.has_queue(&a));
    }

    #[tokio::test]
    async fn reject_sending_to_unknown_queue() {
        let broker = MemoryBroker::new(1);

        assert_eq!(
            broker.send("nowhere", Envelope::new()),
            Err(MemoryTransportError::UnknownQueue("nowhere".into()))
        );
    }

    #[tokio::test]
    async fn deliver_to_subscribed_listener() {
        let broker = MemoryBroker::new(4);
        let queue = broker.create_queue("requests");
        let (listener, mut rx) = forward();

        let subscription = broker
            .subscribe(&queue, Some("client.Requestor".into()), listener)
            .await
            .unwrap();
        assert_eq!(subscription.queue(), "requests");
        assert_eq!(subscription.client_id(), Some("client.Requestor"));

        let message = Envelope::new().with_correlation_id(CorrelationId::generate());
        broker.send(&queue, message.clone()).unwrap();

        assert_eq!(next(&mut rx).await, message);
    }

    #[tokio::test]
    async fn reject_second_subscription() {
        let broker = MemoryBroker::new(1);
        let queue = broker.create_queue("requests");

        let _subscription = broker.subscribe(&queue, None, forward().0).await.unwrap();
        let error = broker.subscribe(&queue, None, forward().0).await.unwrap_err();

        assert_eq!(error.to_string(), "queue requests already has an active subscription");
    }

    #[tokio::test]
    async fn retain_messages_while_unsubscribed() {
        let broker = MemoryBroker::new(2);
        let queue = broker.create_queue("requests");

        let subscription = broker.subscribe(&queue, None, forward().0).await.unwrap();
        broker.unsubscribe(subscription).await.unwrap();

        let message = Envelope::new().with_header("n", "1");
        broker.send(&queue, message.clone()).unwrap();

        let (listener, mut rx) = forward();
        let _subscription = broker.subscribe(&queue, None, listener).await.unwrap();

        assert_eq!(next(&mut rx).await, message);
    }

    #[tokio::test]
    async fn route_failures_to_exception_listener() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let broker = MemoryBroker::with_exception_listener(1, move |e: FailedToProcessResponse<Envelope>| {
            tx.send(e.into_parts().0).ok();
        });
        let queue = broker.create_queue("requests");

        let _subscription = broker.subscribe(&queue, None, Arc::new(Reject)).await.unwrap();

        let message = Envelope::new().with_header("n", "1");
        broker.send(&queue, message.clone()).unwrap();

        assert_eq!(next(&mut rx).await, message);
    }
}
