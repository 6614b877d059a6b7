//! The uniform `{type, payload, requestId}` message wrapper.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// A single signaling message, in either direction.
///
/// `payload` is absent for messages that carry no arguments
/// (`leave-room`). `request_id` is an opaque client-chosen correlation
/// id: replies echo it, notifications omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type, e.g. `join-room` or `participant-left`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Message arguments. Shape depends on `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Correlation id echoed on direct replies.
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Envelope {
    /// Build an envelope.
    pub fn new(kind: impl Into<String>, payload: Option<Value>, request_id: Option<String>) -> Self {
        Self { kind: kind.into(), payload, request_id }
    }

    /// Parse an inbound text frame.
    ///
    /// Fails when the text is not valid JSON, not an object, or has no
    /// `type` field. A failed parse never yields a correlation id, so
    /// the resulting `invalid_message` reply carries none.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> String {
        // An Envelope is a plain struct over JSON values; serialization
        // cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_full_envelope() {
        let envelope =
            Envelope::parse(r#"{"type":"join-room","payload":{"roomId":"r1"},"requestId":"42"}"#)
                .unwrap();
        assert_eq!(envelope.kind, "join-room");
        assert_eq!(envelope.payload, Some(json!({"roomId": "r1"})));
        assert_eq!(envelope.request_id.as_deref(), Some("42"));
    }

    #[test]
    fn parse_without_payload_or_request_id() {
        let envelope = Envelope::parse(r#"{"type":"leave-room"}"#).unwrap();
        assert_eq!(envelope.kind, "leave-room");
        assert!(envelope.payload.is_none());
        assert!(envelope.request_id.is_none());
    }

    #[test]
    fn parse_rejects_missing_type() {
        assert!(Envelope::parse(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse("[1,2,3]").is_err());
    }

    #[test]
    fn to_json_omits_absent_fields() {
        let envelope = Envelope::new("leave-room", None, None);
        assert_eq!(envelope.to_json(), r#"{"type":"leave-room"}"#);
    }

    #[test]
    fn to_json_round_trips() {
        let envelope = Envelope::new("offer", Some(json!({"targetId": "p1"})), Some("7".into()));
        let back = Envelope::parse(&envelope.to_json()).unwrap();
        assert_eq!(back, envelope);
    }
}
