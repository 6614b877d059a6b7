//! Wire protocol for the huddle signaling server.
//!
//! Every message in either direction is a flat JSON envelope:
//! `{ "type": string, "payload"?: object, "requestId"?: string }`.
//! Replies to a specific request echo the same `requestId`;
//! server-initiated notifications omit it.
//!
//! Inbound envelopes are validated once at the protocol boundary and
//! turned into a [`ClientRequest`] variant, so dispatch handlers work
//! with typed payloads instead of re-checking untyped JSON. Outbound
//! messages are built as [`ServerMessage`] variants and serialized back
//! into envelopes.
//!
//! # Invariants
//!
//! Each [`ClientRequest`] and [`ServerMessage`] variant maps to exactly
//! one `type` string (enforced by match exhaustiveness in
//! `from_envelope` / `kind`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod ids;
mod message;
mod request;

pub use envelope::Envelope;
pub use error::ProtocolError;
pub use ids::{ParticipantId, RoomId};
pub use message::{ErrorCode, ParticipantSummary, Role, ServerMessage};
pub use request::{CandidateRelay, ClientRequest, CreateRoom, DescriptionRelay, JoinRoom};
