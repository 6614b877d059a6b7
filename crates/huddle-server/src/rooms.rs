//! Room registry.
//!
//! Rooms are an in-memory, process-local namespace for signaling. They
//! exist from explicit creation until the process exits; an empty room
//! stays addressable so its creator can share the id before joining.

use std::collections::HashMap;

use huddle_proto::{ParticipantId, ParticipantSummary, Role, RoomId};

use crate::env::Environment;

/// A participant currently present in a room.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Connection-scoped participant identifier.
    pub id: ParticipantId,
    /// Directory identity of the person behind the connection.
    pub user_id: String,
    /// Display name shown to peers.
    pub username: String,
    /// Role assigned at join time.
    pub role: Role,
}

/// A signaling room and its current membership.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    owner_user_id: String,
    password: Option<String>,
    participants: HashMap<ParticipantId, Participant>,
}

impl Room {
    fn new(id: RoomId, owner_user_id: String, password: Option<String>) -> Self {
        Self { id, owner_user_id, password, participants: HashMap::new() }
    }

    /// Room identifier.
    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// User id of the creator. Joins by this user get the facilitator role.
    #[must_use]
    pub fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }

    /// Check a supplied password against the room's.
    ///
    /// Passwordless rooms admit everyone, including callers who supply a
    /// password anyway. An absent password is equivalent to an empty one.
    #[must_use]
    pub fn verify_password(&self, supplied: Option<&str>) -> bool {
        match &self.password {
            None => true,
            Some(expected) => supplied.unwrap_or("") == expected,
        }
    }

    /// Register a participant. Re-inserting the same id overwrites.
    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.insert(participant.id.clone(), participant);
    }

    /// Remove a participant. No-op when the id is not a member.
    pub fn remove_participant(&mut self, id: &ParticipantId) -> Option<Participant> {
        self.participants.remove(id)
    }

    /// Look up a participant by id.
    #[must_use]
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Whether the given participant is a member.
    #[must_use]
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    /// Ids of all current members, in no particular order.
    pub fn participant_ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.keys()
    }

    /// Membership snapshot for a `room-joined` reply.
    #[must_use]
    pub fn membership_snapshot(&self) -> Vec<ParticipantSummary> {
        self.participants
            .values()
            .map(|p| ParticipantSummary {
                id: p.id.clone(),
                username: p.username.clone(),
                role: p.role,
            })
            .collect()
    }

    /// Number of current members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// All rooms known to this process.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with a fresh unguessable id and return it.
    pub fn create_room<E: Environment>(
        &mut self,
        owner_user_id: &str,
        password: Option<String>,
        env: &E,
    ) -> &Room {
        let id = loop {
            let candidate = RoomId::from_u128(env.random_u128());
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Room::new(id.clone(), owner_user_id.to_string(), password);
        self.rooms.entry(id).or_insert(room)
    }

    /// Look up a room by id.
    #[must_use]
    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Mutable room lookup.
    pub fn room_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Whether a room with this id exists.
    #[must_use]
    pub fn has_room(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    /// Number of rooms ever created and still held.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
