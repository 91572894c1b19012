use crate::BoxedError;
use std::fmt::Debug;
use thiserror::Error;

/// Inbound message that could not be processed
///
/// Carries the original message alongside the cause so that the transport's error channel
/// can decide whether to log, dead-letter or inspect it. Raised when the correlation id of a
/// message can not be read (e.g. because of a decoding failure on the transport level).
#[derive(Error, Debug)]
#[error("failed to process response")]
pub struct FailedToProcessResponse<M: Debug> {
    message: M,
    source: BoxedError,
}

impl<M: Debug> FailedToProcessResponse<M> {
    /// Creates a new instance from raw parts
    pub fn new(message: M, source: BoxedError) -> Self {
        Self { message, source }
    }

    /// Message which failed to be processed
    pub fn message(&self) -> &M {
        &self.message
    }

    /// Splits the error into the original message and its cause
    pub fn into_parts(self) -> (M, BoxedError) {
        (self.message, self.source)
    }
}
