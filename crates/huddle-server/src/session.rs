//! Per-connection session state.

use huddle_auth::{derive_username, User};
use huddle_proto::{ParticipantId, RoomId};

/// State carried by one authenticated WebSocket connection.
///
/// The participant id is minted once at authentication and stays stable
/// for the life of the connection, even as the session moves between
/// rooms. A session is a member of at most one room at a time.
#[derive(Debug)]
pub struct ConnectionSession {
    user: User,
    participant_id: ParticipantId,
    username: String,
    current_room: Option<RoomId>,
}

impl ConnectionSession {
    /// Create a session for a freshly authenticated connection.
    #[must_use]
    pub fn new(user: User, participant_id: ParticipantId) -> Self {
        let username = derive_username(&user);
        Self { user, participant_id, username, current_room: None }
    }

    /// Directory identity behind this connection.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Connection-scoped participant id.
    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Display name derived from the directory record.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Room this session currently occupies, if any.
    #[must_use]
    pub fn current_room(&self) -> Option<&RoomId> {
        self.current_room.as_ref()
    }

    /// Whether this session is a member of the given room.
    #[must_use]
    pub fn is_member_of(&self, room_id: &RoomId) -> bool {
        self.current_room.as_ref() == Some(room_id)
    }

    /// Enter a room, replacing any previous membership.
    pub fn enter_room(&mut self, room_id: RoomId) {
        self.current_room = Some(room_id);
    }

    /// Leave the current room, returning it. No-op when roomless.
    pub fn leave_room(&mut self) -> Option<RoomId> {
        self.current_room.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
        }
    }

    #[test]
    fn new_session_starts_roomless() {
        let session = ConnectionSession::new(user(), ParticipantId::from_u128(1));
        assert!(session.current_room().is_none());
        assert_eq!(session.username(), "Ada");
    }

    #[test]
    fn entering_a_room_replaces_the_previous_one() {
        let mut session = ConnectionSession::new(user(), ParticipantId::from_u128(1));
        let first = RoomId::from_u128(10);
        let second = RoomId::from_u128(20);
        session.enter_room(first.clone());
        assert!(session.is_member_of(&first));
        session.enter_room(second.clone());
        assert!(session.is_member_of(&second));
        assert!(!session.is_member_of(&first));
    }

    #[test]
    fn leave_room_is_idempotent() {
        let mut session = ConnectionSession::new(user(), ParticipantId::from_u128(1));
        session.enter_room(RoomId::from_u128(10));
        assert!(session.leave_room().is_some());
        assert!(session.leave_room().is_none());
    }
}
