//! WebSocket accept path.
//!
//! The bearer token travels in the upgrade request's query string
//! (`GET /?token=...`), so it is captured during the HTTP handshake,
//! before any WebSocket frame is exchanged.

use tokio::net::TcpStream;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
    WebSocketStream,
};

use crate::error::ServerError;

/// Application close code for handshake authentication failures.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Close reason when the upgrade request carried no token at all.
pub const REASON_TOKEN_MISSING: &str = "authentication token missing";

/// Close reason when a token was present but did not verify, or its
/// subject is unknown. Deliberately does not say which.
pub const REASON_AUTH_FAILED: &str = "authentication failed";

/// Accept the WebSocket upgrade, extracting the bearer token from the
/// request URI along the way.
pub async fn accept(
    stream: TcpStream,
) -> Result<(WebSocketStream<TcpStream>, Option<String>), ServerError> {
    let mut token = None;
    let ws = accept_hdr_async(stream, |request: &Request, response: Response| {
        token = bearer_token(request.uri().query());
        Ok::<_, ErrorResponse>(response)
    })
    .await?;
    Ok((ws, token))
}

/// Pull the `token` parameter out of a raw query string.
#[must_use]
pub fn bearer_token(query: Option<&str>) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

/// Build a close frame message.
#[must_use]
pub fn close_frame(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    }))
}
