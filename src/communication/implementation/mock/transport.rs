use crate::communication::transport::{MessageListener, ReplyTransport};
use crate::communication::{Envelope, FailedToProcessResponse};
use crate::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Listener = Arc<dyn MessageListener<Envelope>>;

#[derive(Default)]
struct MockTransportState {
    subscriptions: Vec<String>,
    client_ids: Vec<Option<String>>,
    listeners: Vec<Option<Listener>>,
}

/// Transport recording subscriptions and delivering messages synchronously on demand
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
    fail_next: Arc<AtomicBool>,
}

/// Index of the subscription within the [`MockTransport`]
pub struct MockSubscription(usize);

impl MockTransport {
    /// Rejects the next call to subscribe
    pub fn fail_next_subscription(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Destinations of all subscriptions ever made
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Client ids passed along with each subscription
    pub fn client_ids(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().client_ids.clone()
    }

    /// Number of subscriptions that have not been unsubscribed
    pub fn active_subscriptions(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.listeners.iter().filter(|l| l.is_some()).count()
    }

    /// Hands the message to every active listener on the calling thread
    pub fn deliver(&self, message: Envelope) -> Result<(), FailedToProcessResponse<Envelope>> {
        let listeners: Vec<Listener> = self
            .state
            .lock()
            .unwrap()
            .listeners
            .iter()
            .flatten()
            .cloned()
            .collect();

        assert!(!listeners.is_empty(), "No active subscription to deliver to");

        for listener in listeners {
            listener.on_message(message.clone())?;
        }

        Ok(())
    }
}

#[async_trait]
impl ReplyTransport for MockTransport {
    type Message = Envelope;
    type Destination = String;
    type Subscription = MockSubscription;

    async fn subscribe(
        &self,
        destination: &String,
        client_id: Option<String>,
        listener: Listener,
    ) -> Result<MockSubscription, BoxedError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err("mock transport configured to fail".into());
        }

        let mut state = self.state.lock().unwrap();
        state.subscriptions.push(destination.clone());
        state.client_ids.push(client_id);
        state.listeners.push(Some(listener));

        Ok(MockSubscription(state.listeners.len() - 1))
    }

    async fn unsubscribe(&self, subscription: MockSubscription) -> EmptyResult {
        let mut state = self.state.lock().unwrap();

        match state.listeners.get_mut(subscription.0) {
            Some(listener) => {
                *listener = None;
                Ok(())
            }
            None => Err("unknown subscription".into()),
        }
    }
}
