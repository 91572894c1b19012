use crate::BoxedError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display, Formatter};
use uuid::Uuid;

/// Describes a location where a response should be sent to
///
/// The meaning of the value depends on the transport in use. For the in-process broker
/// it is the name of a queue; a broker backed transport may use a temporary queue name or topic.
pub type ResponseLocation = String;

/// Opaque token linking a reply to the request that caused it
///
/// Compared by exact value. Callers may bring their own identifiers but have to ensure that
/// they are unique among all pending requests of a requestor. Use [`CorrelationId::generate`]
/// to obtain a random one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wraps an existing identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates a new, random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrows the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Inbound message as seen by the correlation machinery
///
/// Reading the identifier is fallible since transports may only decode the relevant
/// header on demand. Return `Ok(None)` if the message simply does not carry one.
pub trait Message: Debug + Send + 'static {
    /// Correlation identifier of the message, if any
    fn correlation_id(&self) -> Result<Option<CorrelationId>, BoxedError>;
}

/// Generic message with headers and a JSON payload
///
/// Used by the in-process transport but equally suited for any transport that moves
/// opaque bytes around (the envelope itself is serializable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Identifier linking requests and replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Location replies to this message should be sent to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ResponseLocation>,
    /// Arbitrary application headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Serialized payload
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates an empty envelope
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request envelope that expects its reply at the given location
    pub fn request(correlation_id: CorrelationId, reply_to: ResponseLocation) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            reply_to: Some(reply_to),
            ..Self::default()
        }
    }

    /// Creates a reply envelope for the given request, carrying over its correlation id
    pub fn reply(request: &Envelope) -> Self {
        Self {
            correlation_id: request.correlation_id.clone(),
            ..Self::default()
        }
    }

    /// Replaces the correlation identifier
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Adds an application header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Serializes the payload using [`serde_json::to_vec`]
    pub fn with_json_payload<T: Serialize>(mut self, payload: &T) -> Result<Self, BoxedError> {
        self.payload = serde_json::to_vec(payload)?;
        Ok(self)
    }

    /// Parses the payload using [`serde_json::from_slice`]
    pub fn parse_payload<'a, T>(&'a self) -> Result<T, BoxedError>
    where
        T: Deserialize<'a>,
    {
        serde_json::from_slice(&self.payload).map_err(Into::into)
    }
}

impl Message for Envelope {
    fn correlation_id(&self) -> Result<Option<CorrelationId>, BoxedError> {
        Ok(self.correlation_id.clone())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Greeting {
        name: String,
    }

    #[test]
    fn generate_unique_correlation_ids() {
        let a = CorrelationId::generate();
        let b = CorrelationId::generate();

        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn compare_correlation_ids_by_value() {
        assert_eq!(CorrelationId::from("abc"), CorrelationId::new(String::from("abc")));
        assert_eq!(CorrelationId::from("abc").to_string(), "abc");
    }

    #[test]
    fn carry_correlation_id_into_reply() {
        let id = CorrelationId::generate();
        let request = Envelope::request(id.clone(), "replies".into());
        let reply = Envelope::reply(&request);

        assert_eq!(reply.correlation_id().unwrap(), Some(id));
        assert_eq!(reply.reply_to, None);
    }

    #[test]
    fn report_missing_correlation_id() {
        assert_eq!(Envelope::new().correlation_id().unwrap(), None);
    }

    #[test]
    fn parse_json_payload() {
        let greeting = Greeting {
            name: "world".into(),
        };
        let envelope = Envelope::new()
            .with_header("kind", "greeting")
            .with_json_payload(&greeting)
            .unwrap();

        assert_eq!(envelope.headers.get("kind").map(String::as_str), Some("greeting"));
        assert_eq!(envelope.parse_payload::<Greeting>().unwrap(), greeting);
    }

    #[test]
    fn reject_malformed_payload() {
        let envelope = Envelope {
            payload: b"{ not json".to_vec(),
            ..Envelope::default()
        };

        assert!(envelope.parse_payload::<Greeting>().is_err());
    }

    #[test]
    fn serialize_correlation_id_transparently() {
        let envelope = Envelope::new().with_correlation_id("abc".into());
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["correlation_id"], "abc");
    }
}
