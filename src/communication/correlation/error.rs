use thiserror::Error;

/// Reasons why a pending request yielded no reply
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    /// The deadline passed before a reply arrived
    #[error("no reply received before the request timed out")]
    RequestTimeout,
    /// The request has been withdrawn or displaced before a reply arrived
    #[error("request was cancelled before a reply arrived")]
    Cancelled,
}
