//! Typed inbound requests.
//!
//! [`ClientRequest::from_envelope`] is the single schema-validation
//! step at the protocol boundary: dispatch handlers receive a typed
//! variant and never re-check untyped JSON fields. Payload fields that
//! feed domain checks (`roomId`, `targetId`, the relay body) are kept
//! optional here so the gateway can answer with the domain error codes
//! the protocol promises instead of a blanket schema error.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    envelope::Envelope,
    error::ProtocolError,
    ids::{ParticipantId, RoomId},
};

/// Arguments to `create-room`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    /// Optional room password, checked verbatim on join.
    #[serde(default)]
    pub password: Option<String>,
}

/// Arguments to `join-room`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    /// Room to join. Absent ids fail with `room_join_failed`.
    #[serde(default)]
    pub room_id: Option<RoomId>,

    /// Supplied password, compared against the room's.
    #[serde(default)]
    pub password: Option<String>,
}

/// Arguments to `offer` and `answer`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRelay {
    /// Participant the description is addressed to.
    #[serde(default)]
    pub target_id: Option<ParticipantId>,

    /// Session description, forwarded unmodified. `Null` when absent;
    /// the gateway rejects non-structured values with
    /// `invalid_payload`.
    #[serde(default)]
    pub description: Value,
}

/// Arguments to `ice-candidate`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRelay {
    /// Participant the candidate is addressed to.
    #[serde(default)]
    pub target_id: Option<ParticipantId>,

    /// Connectivity candidate, forwarded unmodified.
    #[serde(default)]
    pub candidate: Value,
}

/// A validated inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Allocate a new room. The creator is not auto-joined.
    CreateRoom(CreateRoom),
    /// Join a room, implicitly leaving any previous one.
    JoinRoom(JoinRoom),
    /// Leave the current room. No payload; silent success outside one.
    LeaveRoom,
    /// Relay a session-description offer to one participant.
    Offer(DescriptionRelay),
    /// Relay a session-description answer to one participant.
    Answer(DescriptionRelay),
    /// Relay a connectivity candidate to one participant.
    IceCandidate(CandidateRelay),
    /// Legacy message-based handshake; accepted and ignored.
    Authenticate,
}

impl ClientRequest {
    /// Decode a parsed envelope into a typed request.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind.as_str() {
            "create-room" => Ok(Self::CreateRoom(decode_payload(envelope)?)),
            "join-room" => Ok(Self::JoinRoom(decode_payload(envelope)?)),
            "leave-room" => Ok(Self::LeaveRoom),
            "offer" => Ok(Self::Offer(decode_payload(envelope)?)),
            "answer" => Ok(Self::Answer(decode_payload(envelope)?)),
            "ice-candidate" => Ok(Self::IceCandidate(decode_payload(envelope)?)),
            "authenticate" => Ok(Self::Authenticate),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// Decode the payload object, treating an absent payload as empty.
fn decode_payload<T>(envelope: &Envelope) -> Result<T, ProtocolError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match &envelope.payload {
        None => Ok(T::default()),
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|e| ProtocolError::MalformedPayload {
                kind: envelope.kind.clone(),
                detail: e.to_string(),
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(kind: &str, payload: Value) -> Envelope {
        Envelope::new(kind, Some(payload), None)
    }

    #[test]
    fn decode_create_room_with_and_without_password() {
        let request =
            ClientRequest::from_envelope(&envelope("create-room", json!({"password": "p"})))
                .unwrap();
        assert_eq!(
            request,
            ClientRequest::CreateRoom(CreateRoom { password: Some("p".to_string()) })
        );

        let request =
            ClientRequest::from_envelope(&Envelope::new("create-room", None, None)).unwrap();
        assert_eq!(request, ClientRequest::CreateRoom(CreateRoom::default()));
    }

    #[test]
    fn decode_join_room_tolerates_missing_room_id() {
        let request = ClientRequest::from_envelope(&envelope("join-room", json!({}))).unwrap();
        assert_eq!(request, ClientRequest::JoinRoom(JoinRoom::default()));
    }

    #[test]
    fn decode_offer_defaults_missing_description_to_null() {
        let request =
            ClientRequest::from_envelope(&envelope("offer", json!({"targetId": "p1"}))).unwrap();
        let ClientRequest::Offer(relay) = request else {
            panic!("expected offer");
        };
        assert_eq!(relay.target_id, Some(ParticipantId::new("p1")));
        assert!(relay.description.is_null());
    }

    #[test]
    fn decode_ice_candidate_keeps_candidate_verbatim() {
        let candidate = json!({"candidate": "candidate:0 1 UDP 2122", "sdpMLineIndex": 0});
        let request = ClientRequest::from_envelope(&envelope(
            "ice-candidate",
            json!({"targetId": "p2", "candidate": candidate}),
        ))
        .unwrap();
        let ClientRequest::IceCandidate(relay) = request else {
            panic!("expected ice-candidate");
        };
        assert_eq!(relay.candidate, candidate);
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let err = ClientRequest::from_envelope(&Envelope::new("shout", None, None)).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType("shout".to_string()));
    }

    #[test]
    fn decode_rejects_non_object_payload() {
        let err =
            ClientRequest::from_envelope(&envelope("join-room", json!("not an object")))
                .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPayload { .. }));
    }

    #[test]
    fn authenticate_is_recognized() {
        let request =
            ClientRequest::from_envelope(&Envelope::new("authenticate", None, None)).unwrap();
        assert_eq!(request, ClientRequest::Authenticate);
    }
}
