//! huddle signaling server.
//!
//! Token-authenticated WebSocket gateway that lets call participants
//! find each other and exchange WebRTC negotiation messages. The
//! server never inspects media: it holds rooms in memory, relays
//! offers, answers, and candidates between participants, and fans out
//! presence changes.
//!
//! Architecture: [`GatewayDriver`] is the synchronous state machine
//! behind an async mutex; everything in this module is the transport
//! glue that feeds it events and executes its actions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod env;
mod error;
mod gateway;
mod rooms;
mod session;
mod transport;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use futures_util::{SinkExt, StreamExt};
use huddle_auth::{TokenAuthenticator, UserDirectory};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{mpsc, Mutex, RwLock},
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

pub use crate::{
    env::{Environment, SystemEnv},
    error::ServerError,
    gateway::{GatewayAction, GatewayConfig, GatewayDriver, GatewayEvent, CLOSE_TRY_AGAIN_LATER},
    rooms::{Participant, Room, RoomRegistry},
    session::ConnectionSession,
    transport::{CLOSE_UNAUTHORIZED, REASON_AUTH_FAILED, REASON_TOKEN_MISSING},
};

/// Everything needed to start a server.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to listen on, e.g. `0.0.0.0:9030`.
    pub bind_address: String,
    /// HMAC signing secret shared with the token issuer.
    pub secret: String,
    /// Gateway tuning.
    pub gateway: GatewayConfig,
}

/// Outbound message channels, keyed by session id.
///
/// Split from the driver so sends never wait on the driver lock.
struct SharedState {
    senders: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
}

/// A bound, ready-to-run signaling server.
pub struct Server {
    listener: TcpListener,
    driver: Arc<Mutex<GatewayDriver<SystemEnv>>>,
    shared: Arc<SharedState>,
    authenticator: TokenAuthenticator,
    directory: Arc<dyn UserDirectory>,
    env: SystemEnv,
}

impl Server {
    /// Bind the listening socket. Fails on an empty secret or an
    /// unusable bind address.
    pub async fn bind(
        config: ServerRuntimeConfig,
        directory: Arc<dyn UserDirectory>,
    ) -> Result<Self, ServerError> {
        if config.secret.is_empty() {
            return Err(ServerError::Config("signing secret must not be empty".to_string()));
        }
        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("cannot bind {}: {e}", config.bind_address))
        })?;

        let env = SystemEnv::new();
        Ok(Self {
            listener,
            driver: Arc::new(Mutex::new(GatewayDriver::new(config.gateway, env.clone()))),
            shared: Arc::new(SharedState { senders: RwLock::new(HashMap::new()) }),
            authenticator: TokenAuthenticator::new(config.secret.into_bytes()),
            directory,
            env,
        })
    }

    /// Address the server is actually listening on. Useful with an
    /// ephemeral port.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::from)
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self { listener, driver, shared, authenticator, directory, env } = self;
        info!(addr = %listener.local_addr()?, "signaling server listening");

        // Session ids are issued sequentially from the accept loop, so
        // they are unique for the process lifetime.
        let mut next_session_id: u64 = 0;

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    next_session_id += 1;
                    let session_id = next_session_id;
                    debug!(%peer, session_id, "incoming connection");
                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);
                    let authenticator = authenticator.clone();
                    let directory = Arc::clone(&directory);
                    let env = env.clone();
                    tokio::spawn(async move {
                        let result = handle_connection(
                            stream,
                            session_id,
                            driver,
                            shared,
                            &authenticator,
                            directory,
                            env,
                        )
                        .await;
                        if let Err(err) = result {
                            debug!(%peer, %err, "connection ended with error");
                        }
                    });
                },
                Err(err) => {
                    error!(%err, "accept failed");
                },
            }
        }
    }
}

/// Drive one WebSocket connection from handshake to teardown.
async fn handle_connection(
    stream: TcpStream,
    session_id: u64,
    driver: Arc<Mutex<GatewayDriver<SystemEnv>>>,
    shared: Arc<SharedState>,
    authenticator: &TokenAuthenticator,
    directory: Arc<dyn UserDirectory>,
    env: SystemEnv,
) -> Result<(), ServerError> {
    let (mut ws, token) = transport::accept(stream).await?;

    // The handshake gate: no driver event is emitted for connections
    // that never authenticate.
    let Some(token) = token else {
        debug!("upgrade without token");
        let frame = transport::close_frame(CLOSE_UNAUTHORIZED, REASON_TOKEN_MISSING);
        let _ = ws.send(frame).await;
        return Ok(());
    };

    let claims = match authenticator.verify(&token, env.wall_clock_secs()) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(%err, "token rejected");
            let frame = transport::close_frame(CLOSE_UNAUTHORIZED, REASON_AUTH_FAILED);
            let _ = ws.send(frame).await;
            return Ok(());
        },
    };

    let Some(user) = directory.resolve(&claims.subject) else {
        debug!(subject = %claims.subject, "unknown token subject");
        let frame = transport::close_frame(CLOSE_UNAUTHORIZED, REASON_AUTH_FAILED);
        let _ = ws.send(frame).await;
        return Ok(());
    };

    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: the only place that touches the sink, so sends from
    // the driver never block the read loop.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || is_close {
                break;
            }
        }
    });

    shared.senders.write().await.insert(session_id, tx);
    {
        let actions = driver
            .lock()
            .await
            .process_event(GatewayEvent::ConnectionAuthenticated { session_id, user });
        execute_actions(actions, &shared).await;
    }

    let close_reason = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => {
                let actions = driver.lock().await.process_event(GatewayEvent::EnvelopeReceived {
                    session_id,
                    text: text.to_string(),
                });
                execute_actions(actions, &shared).await;
            },
            Some(Ok(Message::Close(_))) | None => break "peer closed".to_string(),
            Some(Ok(_)) => {}, // binary, ping, pong: not part of the protocol
            Some(Err(err)) => break format!("read error: {err}"),
        }
    };

    shared.senders.write().await.remove(&session_id);
    {
        let actions = driver.lock().await.process_event(GatewayEvent::ConnectionClosed {
            session_id,
            reason: close_reason,
        });
        execute_actions(actions, &shared).await;
    }
    writer.abort();
    Ok(())
}

/// Execute driver actions against the live sender map.
///
/// Delivery is fire-and-forget: a session that disconnected between
/// the driver decision and the send just misses the message, exactly
/// as if it had disconnected a moment earlier.
async fn execute_actions(actions: Vec<GatewayAction>, shared: &SharedState) {
    for action in actions {
        match action {
            GatewayAction::Send { session_id, envelope } => {
                let senders = shared.senders.read().await;
                if let Some(tx) = senders.get(&session_id) {
                    if tx.send(Message::Text(envelope.to_json().into())).is_err() {
                        debug!(session_id, "send to closing session dropped");
                    }
                } else {
                    debug!(session_id, "send to unknown session dropped");
                }
            },
            GatewayAction::Close { session_id, code, reason } => {
                info!(session_id, code, reason, "closing session");
                let senders = shared.senders.read().await;
                if let Some(tx) = senders.get(&session_id) {
                    let _ = tx.send(transport::close_frame(code, &reason));
                }
            },
        }
    }
}
