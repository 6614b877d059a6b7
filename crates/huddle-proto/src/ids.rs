//! Opaque identifiers for rooms and participants.
//!
//! Both ids are generated from 128-bit random values and rendered as
//! 32-character lowercase hex, so they are never reused during the
//! process lifetime and relay targeting stays unambiguous after
//! departures. The wire representation is the plain string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Globally unique room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap an identifier received from the wire.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Render a freshly generated 128-bit value as a room id.
    pub fn from_u128(value: u128) -> Self {
        Self(format!("{value:032x}"))
    }

    /// String form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-connection participant identifier.
///
/// Assigned when a connection authenticates and kept for the lifetime
/// of that connection, across room switches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap an identifier received from the wire.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Render a freshly generated 128-bit value as a participant id.
    pub fn from_u128(value: u128) -> Self {
        Self(format!("{value:032x}"))
    }

    /// String form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
