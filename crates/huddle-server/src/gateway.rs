//! Core signaling gateway.
//!
//! [`GatewayDriver`] owns all mutable signaling state (sessions, rooms,
//! the participant index) and is pure request/response: events go in,
//! [`GatewayAction`]s come out, and the transport glue in `lib.rs`
//! executes them. Nothing in here touches a socket, which keeps every
//! protocol rule unit-testable without a runtime.
//!
//! The driver is driven from behind a single async mutex, so events
//! from concurrent connections are applied one at a time and room state
//! never interleaves mid-operation.

use std::collections::HashMap;

use huddle_auth::User;
use huddle_proto::{
    ClientRequest, CreateRoom, Envelope, ErrorCode, JoinRoom, ParticipantId, ProtocolError, Role,
    RoomId, ServerMessage,
};
use serde_json::Value;

use crate::{
    env::Environment,
    rooms::{Participant, RoomRegistry},
    session::ConnectionSession,
};

/// Close code sent when the server is at its connection limit.
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// Gateway tuning knobs.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Admission cap on concurrent authenticated connections.
    pub max_connections: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// An event from the transport layer.
#[derive(Debug)]
pub enum GatewayEvent {
    /// A connection passed the token handshake.
    ConnectionAuthenticated {
        /// Transport-assigned connection id.
        session_id: u64,
        /// Resolved directory identity.
        user: User,
    },

    /// A text frame arrived on an authenticated connection.
    EnvelopeReceived {
        /// Transport-assigned connection id.
        session_id: u64,
        /// Raw frame text, not yet parsed.
        text: String,
    },

    /// The connection ended, cleanly or not.
    ConnectionClosed {
        /// Transport-assigned connection id.
        session_id: u64,
        /// Short description for logging.
        reason: String,
    },
}

/// An instruction for the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAction {
    /// Send an envelope to one connection.
    Send {
        /// Destination connection.
        session_id: u64,
        /// Message to deliver.
        envelope: Envelope,
    },

    /// Close a connection with a WebSocket close frame.
    Close {
        /// Connection to close.
        session_id: u64,
        /// WebSocket close code.
        code: u16,
        /// Close reason text.
        reason: String,
    },
}

/// A request that failed a protocol rule; becomes an `error` envelope.
struct Reject {
    code: ErrorCode,
    message: String,
}

impl Reject {
    fn join_failed(message: &str) -> Self {
        Self { code: ErrorCode::RoomJoinFailed, message: message.to_string() }
    }

    fn not_allowed() -> Self {
        Self {
            code: ErrorCode::SignalingNotAllowed,
            message: "not a member of any room".to_string(),
        }
    }

    fn target_offline() -> Self {
        Self {
            code: ErrorCode::SignalingTargetOffline,
            message: "target participant is not available".to_string(),
        }
    }

    fn invalid_payload(message: &str) -> Self {
        Self { code: ErrorCode::InvalidPayload, message: message.to_string() }
    }

    fn internal(message: &str) -> Self {
        Self { code: ErrorCode::InternalError, message: message.to_string() }
    }
}

/// Which relay verb is being processed; fixes the outbound message kind.
#[derive(Debug, Clone, Copy)]
enum RelayKind {
    Offer,
    Answer,
    IceCandidate,
}

impl RelayKind {
    const fn noun(self) -> &'static str {
        match self {
            Self::Offer | Self::Answer => "description",
            Self::IceCandidate => "candidate",
        }
    }

    fn message(self, from: ParticipantId, body: Value) -> ServerMessage {
        match self {
            Self::Offer => ServerMessage::Offer { from, description: body },
            Self::Answer => ServerMessage::Answer { from, description: body },
            Self::IceCandidate => ServerMessage::IceCandidate { from, candidate: body },
        }
    }
}

/// The signaling state machine.
pub struct GatewayDriver<E: Environment> {
    sessions: HashMap<u64, ConnectionSession>,
    participant_index: HashMap<ParticipantId, u64>,
    rooms: RoomRegistry,
    config: GatewayConfig,
    env: E,
}

impl<E: Environment> GatewayDriver<E> {
    /// Create a driver with no sessions or rooms.
    pub fn new(config: GatewayConfig, env: E) -> Self {
        Self {
            sessions: HashMap::new(),
            participant_index: HashMap::new(),
            rooms: RoomRegistry::new(),
            config,
            env,
        }
    }

    /// Apply one event and return the actions it produced.
    pub fn process_event(&mut self, event: GatewayEvent) -> Vec<GatewayAction> {
        match event {
            GatewayEvent::ConnectionAuthenticated { session_id, user } => {
                self.handle_authenticated(session_id, user)
            },
            GatewayEvent::EnvelopeReceived { session_id, text } => {
                self.handle_envelope(session_id, &text)
            },
            GatewayEvent::ConnectionClosed { session_id, reason } => {
                self.handle_closed(session_id, &reason)
            },
        }
    }

    /// Number of live authenticated sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Room registry, exposed for inspection.
    #[must_use]
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Participant id minted for a session, if it is live.
    #[must_use]
    pub fn participant_id(&self, session_id: u64) -> Option<&ParticipantId> {
        self.sessions.get(&session_id).map(ConnectionSession::participant_id)
    }

    fn handle_authenticated(&mut self, session_id: u64, user: User) -> Vec<GatewayAction> {
        if self.sessions.len() >= self.config.max_connections {
            tracing::warn!(session_id, "connection limit reached, refusing session");
            return vec![GatewayAction::Close {
                session_id,
                code: CLOSE_TRY_AGAIN_LATER,
                reason: "server at capacity".to_string(),
            }];
        }

        let participant_id = loop {
            let candidate = ParticipantId::from_u128(self.env.random_u128());
            if !self.participant_index.contains_key(&candidate) {
                break candidate;
            }
        };

        tracing::info!(session_id, participant = %participant_id, user = %user.id, "session authenticated");
        self.participant_index.insert(participant_id.clone(), session_id);
        self.sessions.insert(session_id, ConnectionSession::new(user, participant_id));
        Vec::new()
    }

    fn handle_closed(&mut self, session_id: u64, reason: &str) -> Vec<GatewayAction> {
        let actions = self.leave_current_room(session_id);
        if let Some(session) = self.sessions.remove(&session_id) {
            self.participant_index.remove(session.participant_id());
            tracing::info!(session_id, participant = %session.participant_id(), reason, "session closed");
        }
        actions
    }

    fn handle_envelope(&mut self, session_id: u64, text: &str) -> Vec<GatewayAction> {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(session_id, %err, "unparseable envelope");
                return vec![self.error_reply(
                    session_id,
                    None,
                    ErrorCode::InvalidMessage,
                    "malformed message",
                )];
            },
        };

        let request_id = envelope.request_id.clone();
        let request = match ClientRequest::from_envelope(&envelope) {
            Ok(request) => request,
            Err(ProtocolError::UnknownType(kind)) => {
                tracing::debug!(session_id, %kind, "unknown message type");
                return vec![self.error_reply(
                    session_id,
                    request_id,
                    ErrorCode::InvalidMessage,
                    &format!("unknown message type: {kind}"),
                )];
            },
            Err(err) => {
                tracing::debug!(session_id, %err, "malformed payload");
                return vec![self.error_reply(
                    session_id,
                    request_id,
                    ErrorCode::InvalidMessage,
                    "malformed message payload",
                )];
            },
        };

        if !self.sessions.contains_key(&session_id) {
            tracing::warn!(session_id, "envelope from unknown session");
            return Vec::new();
        }

        let result = match request {
            ClientRequest::CreateRoom(create) => {
                self.handle_create_room(session_id, create, request_id.clone())
            },
            ClientRequest::JoinRoom(join) => {
                self.handle_join_room(session_id, join, request_id.clone())
            },
            ClientRequest::LeaveRoom => Ok(self.leave_current_room(session_id)),
            ClientRequest::Offer(relay) => {
                self.handle_relay(session_id, RelayKind::Offer, relay.target_id, relay.description)
            },
            ClientRequest::Answer(relay) => {
                self.handle_relay(session_id, RelayKind::Answer, relay.target_id, relay.description)
            },
            ClientRequest::IceCandidate(relay) => {
                self.handle_relay(
                    session_id,
                    RelayKind::IceCandidate,
                    relay.target_id,
                    relay.candidate,
                )
            },
            ClientRequest::Authenticate => {
                tracing::debug!(session_id, "ignoring in-band authenticate message");
                Ok(Vec::new())
            },
        };

        match result {
            Ok(actions) => actions,
            Err(reject) => {
                vec![self.error_reply(session_id, request_id, reject.code, &reject.message)]
            },
        }
    }

    fn handle_create_room(
        &mut self,
        session_id: u64,
        create: CreateRoom,
        request_id: Option<String>,
    ) -> Result<Vec<GatewayAction>, Reject> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or_else(|| Reject::internal("session vanished"))?;
        let room = self.rooms.create_room(&session.user().id, create.password, &self.env);
        let room_id = room.id().clone();
        tracing::info!(session_id, room = %room_id, "room created");

        Ok(vec![GatewayAction::Send {
            session_id,
            envelope: ServerMessage::RoomCreated { room_id }.into_envelope(request_id),
        }])
    }

    fn handle_join_room(
        &mut self,
        session_id: u64,
        join: JoinRoom,
        request_id: Option<String>,
    ) -> Result<Vec<GatewayAction>, Reject> {
        // Validation comes first: a failed join must not disturb the
        // session's current membership.
        let room_id = join.room_id.ok_or_else(|| Reject::join_failed("room not found"))?;
        let room = self.rooms.room(&room_id).ok_or_else(|| Reject::join_failed("room not found"))?;
        if !room.verify_password(join.password.as_deref()) {
            tracing::debug!(session_id, room = %room_id, "join refused: bad password");
            return Err(Reject::join_failed("invalid room password"));
        }
        let owner_user_id = room.owner_user_id().to_string();

        let session = self
            .sessions
            .get(&session_id)
            .ok_or_else(|| Reject::internal("session vanished"))?;

        // Re-joining the current room replays the reply without
        // re-registering or re-broadcasting.
        if session.is_member_of(&room_id) {
            let room =
                self.rooms.room(&room_id).ok_or_else(|| Reject::internal("room vanished"))?;
            return Ok(vec![GatewayAction::Send {
                session_id,
                envelope: ServerMessage::RoomJoined {
                    room_id,
                    participant_id: session.participant_id().clone(),
                    participants: room.membership_snapshot(),
                }
                .into_envelope(request_id),
            }]);
        }

        let mut actions = if session.current_room().is_some() {
            self.leave_current_room(session_id)
        } else {
            Vec::new()
        };

        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Reject::internal("session vanished"))?;
        let role = if session.user().id == owner_user_id {
            Role::Facilitator
        } else {
            Role::Explorer
        };
        let participant = Participant {
            id: session.participant_id().clone(),
            user_id: session.user().id.clone(),
            username: session.username().to_string(),
            role,
        };
        session.enter_room(room_id.clone());

        let room =
            self.rooms.room_mut(&room_id).ok_or_else(|| Reject::internal("room vanished"))?;
        room.add_participant(participant.clone());
        tracing::info!(session_id, room = %room_id, participant = %participant.id, ?role, "participant joined");

        let snapshot = room.membership_snapshot();
        let peers = self.peer_sessions(&room_id, &participant.id);

        actions.push(GatewayAction::Send {
            session_id,
            envelope: ServerMessage::RoomJoined {
                room_id,
                participant_id: participant.id.clone(),
                participants: snapshot,
            }
            .into_envelope(request_id),
        });

        let joined = ServerMessage::ParticipantJoined {
            participant_id: participant.id,
            username: participant.username,
            role,
        };
        for peer in peers {
            actions.push(GatewayAction::Send {
                session_id: peer,
                envelope: joined.clone().into_envelope(None),
            });
        }

        Ok(actions)
    }

    fn handle_relay(
        &mut self,
        session_id: u64,
        kind: RelayKind,
        target_id: Option<ParticipantId>,
        body: Value,
    ) -> Result<Vec<GatewayAction>, Reject> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or_else(|| Reject::internal("session vanished"))?;
        let room_id = session.current_room().ok_or_else(Reject::not_allowed)?.clone();
        let from = session.participant_id().clone();

        if !is_structured(&body) {
            return Err(Reject::invalid_payload(&format!(
                "{} must be a structured value",
                kind.noun()
            )));
        }

        let target_id = target_id.ok_or_else(Reject::target_offline)?;
        let room = self.rooms.room(&room_id).ok_or_else(|| Reject::internal("room vanished"))?;
        if !room.contains(&target_id) {
            return Err(Reject::target_offline());
        }
        let target_session =
            *self.participant_index.get(&target_id).ok_or_else(Reject::target_offline)?;

        tracing::debug!(session_id, target = %target_id, kind = ?kind, "relaying");
        Ok(vec![GatewayAction::Send {
            session_id: target_session,
            envelope: kind.message(from, body).into_envelope(None),
        }])
    }

    /// Remove the session from its current room and notify the
    /// remaining members. Silent no-op for roomless sessions.
    fn leave_current_room(&mut self, session_id: u64) -> Vec<GatewayAction> {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return Vec::new();
        };
        let Some(room_id) = session.leave_room() else {
            return Vec::new();
        };
        let participant_id = session.participant_id().clone();

        let Some(room) = self.rooms.room_mut(&room_id) else {
            tracing::error!(session_id, room = %room_id, "session was in a room that no longer exists");
            return Vec::new();
        };
        room.remove_participant(&participant_id);
        tracing::info!(session_id, room = %room_id, participant = %participant_id, "participant left");

        let left = ServerMessage::ParticipantLeft { participant_id: participant_id.clone() };
        self.peer_sessions(&room_id, &participant_id)
            .into_iter()
            .map(|peer| GatewayAction::Send {
                session_id: peer,
                envelope: left.clone().into_envelope(None),
            })
            .collect()
    }

    /// Session ids of everyone in `room_id` except `exclude`.
    fn peer_sessions(&self, room_id: &RoomId, exclude: &ParticipantId) -> Vec<u64> {
        let Some(room) = self.rooms.room(room_id) else {
            return Vec::new();
        };
        room.participant_ids()
            .filter(|id| *id != exclude)
            .filter_map(|id| self.participant_index.get(id).copied())
            .collect()
    }

    fn error_reply(
        &self,
        session_id: u64,
        request_id: Option<String>,
        code: ErrorCode,
        message: &str,
    ) -> GatewayAction {
        GatewayAction::Send {
            session_id,
            envelope: ServerMessage::error(code, message).into_envelope(request_id),
        }
    }
}

/// A relay body must be an object or array; scalars and null carry no
/// usable negotiation data.
fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
