//! Handshake gate tests: token checks happen before any signaling.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use huddle_auth::{InMemoryDirectory, TokenAuthenticator, User};
use huddle_client::SignalingClient;
use huddle_server::{GatewayConfig, Server, ServerRuntimeConfig};

const SECRET: &str = "handshake-test-secret";

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: String::new(),
    }
}

async fn start_server(users: Vec<User>) -> String {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        secret: SECRET.to_string(),
        gateway: GatewayConfig::default(),
    };
    let directory = Arc::new(InMemoryDirectory::from_users(users));
    let server = Server::bind(config, directory).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr.to_string()
}

fn token_for(subject: &str) -> String {
    TokenAuthenticator::new(SECRET.as_bytes().to_vec()).sign(subject, now() + 3600)
}

#[tokio::test]
async fn missing_token_closes_with_token_missing_reason() {
    let addr = start_server(vec![user("u1")]).await;
    let mut client = SignalingClient::connect(&addr, None).await.unwrap();
    let (code, reason) = client.recv_close().await.unwrap();
    assert_eq!(code, Some(4401));
    assert_eq!(reason, "authentication token missing");
}

#[tokio::test]
async fn garbage_token_closes_with_auth_failed_reason() {
    let addr = start_server(vec![user("u1")]).await;
    let mut client = SignalingClient::connect(&addr, Some("not.a.token")).await.unwrap();
    let (code, reason) = client.recv_close().await.unwrap();
    assert_eq!(code, Some(4401));
    assert_eq!(reason, "authentication failed");
}

#[tokio::test]
async fn expired_token_closes_with_auth_failed_reason() {
    let addr = start_server(vec![user("u1")]).await;
    let expired = TokenAuthenticator::new(SECRET.as_bytes().to_vec()).sign("u1", now() - 10);
    let mut client = SignalingClient::connect(&addr, Some(&expired)).await.unwrap();
    let (code, reason) = client.recv_close().await.unwrap();
    assert_eq!(code, Some(4401));
    assert_eq!(reason, "authentication failed");
}

#[tokio::test]
async fn token_signed_with_wrong_secret_is_rejected() {
    let addr = start_server(vec![user("u1")]).await;
    let forged = TokenAuthenticator::new(b"other-secret".to_vec()).sign("u1", now() + 3600);
    let mut client = SignalingClient::connect(&addr, Some(&forged)).await.unwrap();
    let (code, reason) = client.recv_close().await.unwrap();
    assert_eq!(code, Some(4401));
    assert_eq!(reason, "authentication failed");
}

#[tokio::test]
async fn unknown_subject_is_rejected_like_a_bad_token() {
    let addr = start_server(vec![user("u1")]).await;
    let mut client =
        SignalingClient::connect(&addr, Some(&token_for("nobody"))).await.unwrap();
    let (code, reason) = client.recv_close().await.unwrap();
    assert_eq!(code, Some(4401));
    assert_eq!(reason, "authentication failed");
}

#[tokio::test]
async fn valid_token_keeps_the_connection_open() {
    let addr = start_server(vec![user("u1")]).await;
    let mut client = SignalingClient::connect(&addr, Some(&token_for("u1"))).await.unwrap();

    // The connection is usable: a request gets a reply, not a close.
    client.send_request("create-room", None, Some("1")).await.unwrap();
    let (message, request_id) = client.recv_message().await.unwrap();
    assert_eq!(request_id.as_deref(), Some("1"));
    assert!(matches!(message, huddle_proto::ServerMessage::RoomCreated { .. }));
    client.close().await.unwrap();
}
