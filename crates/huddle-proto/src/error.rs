//! Protocol-level decode errors.

use thiserror::Error;

/// Errors raised while decoding inbound envelopes.
///
/// All variants are reported back to the sender as an `error` envelope
/// with code `invalid_message`; none of them close the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The text was not a JSON object with a `type` field.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The `type` was recognized but the payload did not match its
    /// schema.
    #[error("malformed {kind} payload: {detail}")]
    MalformedPayload {
        /// Message type the payload was decoded for.
        kind: String,
        /// Decoder error detail.
        detail: String,
    },

    /// The `type` field named a message this server does not handle.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}
