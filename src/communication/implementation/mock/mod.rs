//! Test doubles for the transport traits

mod resolver;
mod transport;

pub use resolver::MockResolver;
pub use transport::{MockSubscription, MockTransport};
