//! Various small helper functions

use std::num::ParseIntError;
use std::time::Duration;

/// Parses a Duration from a string containing milliseconds.
/// Useful for command line parsing
pub fn parse_millis(src: &str) -> Result<Duration, ParseIntError> {
    let millis = src.trim().parse::<u64>()?;
    Ok(Duration::from_millis(millis))
}

/// Appends the `.Requestor` suffix used to tell reply subscriptions apart from other
/// connections sharing the same client id
pub fn requestor_client_id(client_id: &str) -> String {
    format!("{}.Requestor", client_id)
}
