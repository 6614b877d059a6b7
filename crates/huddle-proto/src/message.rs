//! Outbound server messages.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    envelope::Envelope,
    error::ProtocolError,
    ids::{ParticipantId, RoomId},
};

/// Participant role within a room, fixed at first join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The room's creator.
    Facilitator,
    /// Any other participant.
    Explorer,
}

/// Public view of a room member: never exposes socket handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Participant id.
    pub id: ParticipantId,
    /// Display name derived at connect time.
    pub username: String,
    /// Role within the room.
    pub role: Role,
}

/// Machine-readable error codes carried in `error` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Room missing, unknown, or password mismatch.
    RoomJoinFailed,
    /// Relay attempted while not a member of any room.
    SignalingNotAllowed,
    /// Relay target is not a live participant in the sender's room.
    SignalingTargetOffline,
    /// Relay payload was null or not a structured value.
    InvalidPayload,
    /// Unparseable envelope or unknown message type.
    InvalidMessage,
    /// Unexpected server-side failure while handling a message.
    InternalError,
}

/// A message the server sends to a client.
///
/// Direct replies (`room-created`, `room-joined`, `error`) echo the
/// triggering request's correlation id when converted with
/// [`ServerMessage::into_envelope`]; notifications pass `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Reply to `create-room`.
    RoomCreated {
        /// Id of the freshly allocated room.
        room_id: RoomId,
    },

    /// Reply to `join-room`, carrying the full membership list.
    RoomJoined {
        /// Room that was joined.
        room_id: RoomId,
        /// The joiner's own participant id.
        participant_id: ParticipantId,
        /// Everyone currently in the room, the joiner included.
        participants: Vec<ParticipantSummary>,
    },

    /// Broadcast to existing members when someone joins.
    ParticipantJoined {
        /// The new member's participant id.
        participant_id: ParticipantId,
        /// The new member's display name.
        username: String,
        /// The new member's role.
        role: Role,
    },

    /// Broadcast to remaining members when someone leaves.
    ParticipantLeft {
        /// The departed member's participant id.
        participant_id: ParticipantId,
    },

    /// Relayed session-description offer.
    Offer {
        /// Sender's participant id.
        from: ParticipantId,
        /// The description, forwarded unmodified.
        description: Value,
    },

    /// Relayed session-description answer.
    Answer {
        /// Sender's participant id.
        from: ParticipantId,
        /// The description, forwarded unmodified.
        description: Value,
    },

    /// Relayed connectivity candidate.
    IceCandidate {
        /// Sender's participant id.
        from: ParticipantId,
        /// The candidate, forwarded unmodified.
        candidate: Value,
    },

    /// Error reply. The connection stays open.
    Error {
        /// Machine-readable code, when one applies.
        code: Option<ErrorCode>,
        /// Human-readable description.
        message: String,
    },
}

impl ServerMessage {
    /// Wire `type` string for this message.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "room-created",
            Self::RoomJoined { .. } => "room-joined",
            Self::ParticipantJoined { .. } => "participant-joined",
            Self::ParticipantLeft { .. } => "participant-left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::Error { .. } => "error",
        }
    }

    /// Convenience constructor for error replies.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error { code: Some(code), message: message.into() }
    }

    /// Serialize into an envelope, echoing `request_id` when this is a
    /// direct reply.
    pub fn into_envelope(self, request_id: Option<String>) -> Envelope {
        let kind = self.kind();
        let payload = match self {
            Self::RoomCreated { room_id } => json!({ "roomId": room_id }),
            Self::RoomJoined { room_id, participant_id, participants } => json!({
                "roomId": room_id,
                "participantId": participant_id,
                "participants": participants,
            }),
            Self::ParticipantJoined { participant_id, username, role } => json!({
                "participantId": participant_id,
                "username": username,
                "role": role,
            }),
            Self::ParticipantLeft { participant_id } => {
                json!({ "participantId": participant_id })
            },
            Self::Offer { from, description } | Self::Answer { from, description } => {
                json!({ "from": from, "description": description })
            },
            Self::IceCandidate { from, candidate } => {
                json!({ "from": from, "candidate": candidate })
            },
            Self::Error { code, message } => {
                let mut payload = json!({ "message": message });
                if let Some(code) = code {
                    payload["code"] = json!(code);
                }
                payload
            },
        };

        Envelope::new(kind, Some(payload), request_id)
    }

    /// Decode an envelope received from a server.
    ///
    /// Used by clients; the server never parses its own message kinds.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RoomCreatedPayload {
            room_id: RoomId,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RoomJoinedPayload {
            room_id: RoomId,
            participant_id: ParticipantId,
            participants: Vec<ParticipantSummary>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ParticipantJoinedPayload {
            participant_id: ParticipantId,
            username: String,
            role: Role,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct ParticipantLeftPayload {
            participant_id: ParticipantId,
        }

        #[derive(Deserialize)]
        struct DescriptionPayload {
            from: ParticipantId,
            #[serde(default)]
            description: Value,
        }

        #[derive(Deserialize)]
        struct CandidatePayload {
            from: ParticipantId,
            #[serde(default)]
            candidate: Value,
        }

        #[derive(Deserialize)]
        struct ErrorPayload {
            message: String,
            #[serde(default)]
            code: Option<ErrorCode>,
        }

        fn decode<T: serde::de::DeserializeOwned>(
            envelope: &Envelope,
        ) -> Result<T, ProtocolError> {
            let payload = envelope.payload.clone().unwrap_or(Value::Null);
            serde_json::from_value(payload).map_err(|e| ProtocolError::MalformedPayload {
                kind: envelope.kind.clone(),
                detail: e.to_string(),
            })
        }

        match envelope.kind.as_str() {
            "room-created" => {
                let p: RoomCreatedPayload = decode(envelope)?;
                Ok(Self::RoomCreated { room_id: p.room_id })
            },
            "room-joined" => {
                let p: RoomJoinedPayload = decode(envelope)?;
                Ok(Self::RoomJoined {
                    room_id: p.room_id,
                    participant_id: p.participant_id,
                    participants: p.participants,
                })
            },
            "participant-joined" => {
                let p: ParticipantJoinedPayload = decode(envelope)?;
                Ok(Self::ParticipantJoined {
                    participant_id: p.participant_id,
                    username: p.username,
                    role: p.role,
                })
            },
            "participant-left" => {
                let p: ParticipantLeftPayload = decode(envelope)?;
                Ok(Self::ParticipantLeft { participant_id: p.participant_id })
            },
            "offer" => {
                let p: DescriptionPayload = decode(envelope)?;
                Ok(Self::Offer { from: p.from, description: p.description })
            },
            "answer" => {
                let p: DescriptionPayload = decode(envelope)?;
                Ok(Self::Answer { from: p.from, description: p.description })
            },
            "ice-candidate" => {
                let p: CandidatePayload = decode(envelope)?;
                Ok(Self::IceCandidate { from: p.from, candidate: p.candidate })
            },
            "error" => {
                let p: ErrorPayload = decode(envelope)?;
                Ok(Self::Error { code: p.code, message: p.message })
            },
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}
