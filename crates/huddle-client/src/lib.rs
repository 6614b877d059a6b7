//! Async WebSocket client for the huddle signaling protocol.
//!
//! A thin wrapper over one WebSocket connection: it attaches the
//! bearer token to the upgrade URL, frames envelopes, and decodes
//! inbound frames. Protocol sequencing (when to join, whom to signal)
//! stays with the caller.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use futures_util::{SinkExt, StreamExt};
use huddle_proto::{Envelope, ProtocolError, ServerMessage};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};

/// Client-side errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// WebSocket transport failure, including a rejected upgrade.
    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    /// The server sent something that does not decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The connection closed while an envelope was expected.
    #[error("connection closed: {reason}")]
    Closed {
        /// Close code from the close frame, when one was sent.
        code: Option<u16>,
        /// Close reason text, possibly empty.
        reason: String,
    },
}

impl From<tungstenite::Error> for ClientError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Something received from the server.
#[derive(Debug)]
pub enum Incoming {
    /// A decoded protocol envelope.
    Envelope(Envelope),
    /// The connection is closing or closed.
    Closed {
        /// Close code from the close frame, when one was sent.
        code: Option<u16>,
        /// Close reason text, possibly empty.
        reason: String,
    },
}

/// One signaling connection.
pub struct SignalingClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SignalingClient {
    /// Connect to `host_port` (e.g. `127.0.0.1:9030`), optionally
    /// attaching a bearer token to the upgrade URL.
    pub async fn connect(host_port: &str, token: Option<&str>) -> Result<Self, ClientError> {
        let url = match token {
            Some(token) => format!("ws://{host_port}/?token={token}"),
            None => format!("ws://{host_port}/"),
        };
        tracing::debug!(%url, "connecting");
        let (ws, _response) = connect_async(url.as_str()).await?;
        Ok(Self { ws })
    }

    /// Send a raw envelope.
    pub async fn send_envelope(&mut self, envelope: Envelope) -> Result<(), ClientError> {
        self.ws.send(Message::Text(envelope.to_json().into())).await?;
        Ok(())
    }

    /// Send a request built from parts.
    pub async fn send_request(
        &mut self,
        kind: &str,
        payload: Option<Value>,
        request_id: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send_envelope(Envelope::new(kind, payload, request_id.map(ToString::to_string)))
            .await
    }

    /// Wait for the next envelope or close.
    ///
    /// Non-text frames are skipped. A transport error after the server
    /// closed abruptly is reported as [`Incoming::Closed`].
    pub async fn next(&mut self) -> Result<Incoming, ClientError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Incoming::Envelope(Envelope::parse(&text)?));
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                    return Ok(Incoming::Closed { code, reason });
                },
                Some(Ok(_)) => {},
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::Protocol(_)))
                | None => {
                    return Ok(Incoming::Closed { code: None, reason: String::new() });
                },
                Some(Err(err)) => return Err(ClientError::from(err)),
            }
        }
    }

    /// Wait for the next envelope, failing if the connection closes.
    pub async fn recv_envelope(&mut self) -> Result<Envelope, ClientError> {
        match self.next().await? {
            Incoming::Envelope(envelope) => Ok(envelope),
            Incoming::Closed { code, reason } => Err(ClientError::Closed { code, reason }),
        }
    }

    /// Wait for the next envelope and decode it as a typed server
    /// message, returning the echoed correlation id alongside.
    pub async fn recv_message(
        &mut self,
    ) -> Result<(ServerMessage, Option<String>), ClientError> {
        let envelope = self.recv_envelope().await?;
        let message = ServerMessage::from_envelope(&envelope)?;
        Ok((message, envelope.request_id))
    }

    /// Wait until the server closes the connection, returning the
    /// close code and reason. Envelopes received in the meantime are
    /// discarded.
    pub async fn recv_close(&mut self) -> Result<(Option<u16>, String), ClientError> {
        loop {
            if let Incoming::Closed { code, reason } = self.next().await? {
                return Ok((code, reason));
            }
        }
    }

    /// Close the connection cleanly.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
