//! Request/reply correlation on top of one-way messaging transports
//!
//! Most messaging systems only move messages in one direction. To ask a question and wait for
//! the answer, the asking side tags its request with a unique
//! [`CorrelationId`](communication::CorrelationId) and a reply destination, sends it off and
//! then waits for a message carrying the very same identifier to show up on that destination.
//!
//! This crate provides the machinery that sits between the transport and the waiting caller:
//!
//! - a [`CorrelationRegistry`](communication::correlation::CorrelationRegistry) mapping pending
//!   identifiers to waiters and evicting them once their timeout passed,
//! - [`ReplyWaiter`](communication::correlation::ReplyWaiter) variants for blocking, awaiting and
//!   callback based consumers,
//! - the [`Requestor`](communication::request::Requestor) which owns the subscription to the
//!   reply destination and dispatches inbound replies to their waiters.
//!
//! Transports plug in through the traits in [`communication::transport`]. An in-process
//! reference implementation lives in [`communication::implementation::memory`].

#![deny(missing_docs)]

pub mod communication;
pub mod helpers;
pub mod options;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
