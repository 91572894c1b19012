//! Implementations of the [`transport`](super::transport) traits

pub mod memory;

#[cfg(test)]
pub mod mock;
