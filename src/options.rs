//! Options for configuring a [`Requestor`](crate::communication::request::Requestor)
//!
//! The structs in this module are meant to be flattened into the options struct
//! of the embedding application. This allows for a unified yet non-cluttered
//! option set.

use crate::helpers::{parse_millis, requestor_client_id};
use std::time::Duration;
use structopt::StructOpt;

/// Default time a request may wait for its reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Default interval at which expired requests are purged
pub const DEFAULT_PURGE_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Default maximum number of concurrently pending requests
pub const DEFAULT_PENDING_REQUEST_LIMIT: usize = 25_000;

/// Options relevant for request/reply correlation
#[derive(Debug, Clone, StructOpt)]
pub struct RequestorOptions {
    /// Time in milliseconds a request waits for its reply unless
    /// a different timeout is provided when registering it
    #[structopt(
        long,
        env,
        default_value = "20000",
        parse(try_from_str = parse_millis),
        value_name = "millis"
    )]
    pub request_timeout: Duration,

    /// Interval in milliseconds at which pending requests are checked for expiry.
    /// Timed out requests are detected at most this long after their deadline passed.
    #[structopt(
        long,
        env,
        default_value = "1000",
        parse(try_from_str = parse_millis),
        value_name = "millis"
    )]
    pub request_map_purge_poll_interval: Duration,

    /// Maximum number of concurrent, pending requests.
    /// When more requests are registered, the oldest ones will be cancelled. In reality,
    /// this variable is only here to cap the memory usage and not to actively control the requests.
    #[structopt(long, env, default_value = "25000")]
    pub pending_request_limit: usize,

    /// Client identifier used when subscribing to the reply destination
    #[structopt(long, env)]
    pub client_id: Option<String>,
}

impl RequestorOptions {
    /// Client id for the reply subscription, if one has been configured
    pub fn subscription_client_id(&self) -> Option<String> {
        self.client_id.as_deref().map(requestor_client_id)
    }

    /// Returns a copy with a different purge interval
    pub fn with_purge_poll_interval(mut self, interval: Duration) -> Self {
        self.request_map_purge_poll_interval = interval;
        self
    }

    /// Returns a copy with a different pending request limit
    pub fn with_pending_request_limit(mut self, limit: usize) -> Self {
        self.pending_request_limit = limit;
        self
    }

    /// Returns a copy with a different default request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns a copy with the given client id
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

impl Default for RequestorOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_map_purge_poll_interval: DEFAULT_PURGE_POLL_INTERVAL,
            pending_request_limit: DEFAULT_PENDING_REQUEST_LIMIT,
            client_id: None,
        }
    }
}
