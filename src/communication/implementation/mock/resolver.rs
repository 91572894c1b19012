use crate::communication::transport::DestinationResolver;
use crate::BoxedError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Resolver handing out a fixed destination and counting how often it has been asked
#[derive(Clone)]
pub struct MockResolver {
    destination: Option<String>,
    resolutions: Arc<AtomicUsize>,
}

impl MockResolver {
    /// Resolver handing out the given destination
    pub fn new(destination: &str) -> Self {
        Self {
            destination: Some(destination.to_owned()),
            resolutions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Resolver which fails every resolution attempt
    pub fn failing() -> Self {
        Self {
            destination: None,
            resolutions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of resolution attempts so far
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DestinationResolver for MockResolver {
    type Destination = String;

    async fn resolve_destination(&self) -> Result<String, BoxedError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);

        self.destination
            .clone()
            .ok_or_else(|| "mock resolver configured to fail".into())
    }
}
