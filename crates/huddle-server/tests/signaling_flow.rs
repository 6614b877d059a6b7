//! End-to-end signaling over a real WebSocket connection.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use huddle_auth::{InMemoryDirectory, TokenAuthenticator, User};
use huddle_client::SignalingClient;
use huddle_proto::ServerMessage;
use huddle_server::{GatewayConfig, Server, ServerRuntimeConfig};
use serde_json::json;

const SECRET: &str = "flow-test-secret";

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

fn user(id: &str, display_name: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        display_name: display_name.to_string(),
    }
}

async fn start_server() -> String {
    let config = ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        secret: SECRET.to_string(),
        gateway: GatewayConfig::default(),
    };
    let directory = Arc::new(InMemoryDirectory::from_users(vec![
        user("alice", "Alice"),
        user("bob", "Bob"),
    ]));
    let server = Server::bind(config, directory).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr.to_string()
}

async fn connect(addr: &str, subject: &str) -> SignalingClient {
    let token = TokenAuthenticator::new(SECRET.as_bytes().to_vec()).sign(subject, now() + 3600);
    SignalingClient::connect(addr, Some(&token)).await.unwrap()
}

async fn create_room(client: &mut SignalingClient, password: Option<&str>) -> String {
    let payload = password.map(|p| json!({"password": p}));
    client.send_request("create-room", payload, Some("create")).await.unwrap();
    let (message, request_id) = client.recv_message().await.unwrap();
    assert_eq!(request_id.as_deref(), Some("create"));
    match message {
        ServerMessage::RoomCreated { room_id } => room_id.as_str().to_string(),
        other => panic!("expected room-created, got {other:?}"),
    }
}

async fn join_room(client: &mut SignalingClient, room_id: &str) -> (String, usize) {
    client
        .send_request("join-room", Some(json!({"roomId": room_id})), Some("join"))
        .await
        .unwrap();
    let (message, request_id) = client.recv_message().await.unwrap();
    assert_eq!(request_id.as_deref(), Some("join"));
    match message {
        ServerMessage::RoomJoined { participant_id, participants, .. } => {
            (participant_id.as_str().to_string(), participants.len())
        },
        other => panic!("expected room-joined, got {other:?}"),
    }
}

#[tokio::test]
async fn two_participants_negotiate_through_the_server() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "alice").await;
    let mut bob = connect(&addr, "bob").await;

    let room_id = create_room(&mut alice, None).await;
    let (alice_pid, count) = join_room(&mut alice, &room_id).await;
    assert_eq!(count, 1);

    let (bob_pid, count) = join_room(&mut bob, &room_id).await;
    assert_eq!(count, 2);
    assert_ne!(alice_pid, bob_pid);

    // Alice sees bob arrive, with the explorer role.
    let (message, request_id) = alice.recv_message().await.unwrap();
    assert!(request_id.is_none());
    match message {
        ServerMessage::ParticipantJoined { participant_id, username, role } => {
            assert_eq!(participant_id.as_str(), bob_pid);
            assert_eq!(username, "Bob");
            assert_eq!(role, huddle_proto::Role::Explorer);
        },
        other => panic!("expected participant-joined, got {other:?}"),
    }

    // Offer from alice reaches bob verbatim, stamped with the sender.
    let description = json!({"type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0"});
    alice
        .send_request(
            "offer",
            Some(json!({"targetId": bob_pid, "description": description})),
            None,
        )
        .await
        .unwrap();
    let (message, _) = bob.recv_message().await.unwrap();
    match message {
        ServerMessage::Offer { from, description: received } => {
            assert_eq!(from.as_str(), alice_pid);
            assert_eq!(received, description);
        },
        other => panic!("expected offer, got {other:?}"),
    }

    // Answer travels the other way.
    let answer = json!({"type": "answer", "sdp": "v=0"});
    bob.send_request(
        "answer",
        Some(json!({"targetId": alice_pid, "description": answer})),
        None,
    )
    .await
    .unwrap();
    let (message, _) = alice.recv_message().await.unwrap();
    match message {
        ServerMessage::Answer { from, description: received } => {
            assert_eq!(from.as_str(), bob_pid);
            assert_eq!(received, answer);
        },
        other => panic!("expected answer, got {other:?}"),
    }

    // Candidates flow too.
    let candidate = json!({"candidate": "candidate:0 1 UDP 2122252543 10.0.0.2 54321 typ host"});
    alice
        .send_request(
            "ice-candidate",
            Some(json!({"targetId": bob_pid, "candidate": candidate})),
            None,
        )
        .await
        .unwrap();
    let (message, _) = bob.recv_message().await.unwrap();
    match message {
        ServerMessage::IceCandidate { from, candidate: received } => {
            assert_eq!(from.as_str(), alice_pid);
            assert_eq!(received, candidate);
        },
        other => panic!("expected ice-candidate, got {other:?}"),
    }

    // Bob drops; alice is told.
    bob.close().await.unwrap();
    let (message, _) = alice.recv_message().await.unwrap();
    match message {
        ServerMessage::ParticipantLeft { participant_id } => {
            assert_eq!(participant_id.as_str(), bob_pid);
        },
        other => panic!("expected participant-left, got {other:?}"),
    }
}

#[tokio::test]
async fn password_protected_room_rejects_wrong_password() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "alice").await;
    let mut bob = connect(&addr, "bob").await;

    let room_id = create_room(&mut alice, Some("sesame")).await;
    join_room(&mut alice, &room_id).await;

    bob.send_request(
        "join-room",
        Some(json!({"roomId": room_id, "password": "open sesame"})),
        Some("j1"),
    )
    .await
    .unwrap();
    let (message, request_id) = bob.recv_message().await.unwrap();
    assert_eq!(request_id.as_deref(), Some("j1"));
    match message {
        ServerMessage::Error { code, .. } => {
            assert_eq!(code, Some(huddle_proto::ErrorCode::RoomJoinFailed));
        },
        other => panic!("expected error, got {other:?}"),
    }

    // The right password gets bob in.
    bob.send_request(
        "join-room",
        Some(json!({"roomId": room_id, "password": "sesame"})),
        Some("j2"),
    )
    .await
    .unwrap();
    let (message, _) = bob.recv_message().await.unwrap();
    assert!(matches!(message, ServerMessage::RoomJoined { .. }));
}

#[tokio::test]
async fn relay_to_unknown_target_reports_target_offline() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "alice").await;

    let room_id = create_room(&mut alice, None).await;
    join_room(&mut alice, &room_id).await;

    alice
        .send_request(
            "offer",
            Some(json!({"targetId": "ffffffffffffffffffffffffffffffff", "description": {"sdp": "x"}})),
            Some("o1"),
        )
        .await
        .unwrap();
    let (message, request_id) = alice.recv_message().await.unwrap();
    assert_eq!(request_id.as_deref(), Some("o1"));
    match message {
        ServerMessage::Error { code, .. } => {
            assert_eq!(code, Some(huddle_proto::ErrorCode::SignalingTargetOffline));
        },
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_message_type_keeps_the_connection_usable() {
    let addr = start_server().await;
    let mut alice = connect(&addr, "alice").await;

    alice.send_request("shout", Some(json!({})), Some("s1")).await.unwrap();
    let (message, request_id) = alice.recv_message().await.unwrap();
    assert_eq!(request_id.as_deref(), Some("s1"));
    match message {
        ServerMessage::Error { code, .. } => {
            assert_eq!(code, Some(huddle_proto::ErrorCode::InvalidMessage));
        },
        other => panic!("expected error, got {other:?}"),
    }

    // Still in business.
    let room_id = create_room(&mut alice, None).await;
    assert!(!room_id.is_empty());
}
