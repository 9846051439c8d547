// Public API tests for the chat WebSocket client against an in-process
// server.

use crate::helpers::{channel_sink, recv_within, spawn_chat_server, token_provider, SinkEvent};

use client_core::chat::ChatClient;
use client_core::credentials::StaticTokenProvider;
use client_core::error::chat::ChatError;

use common::ConnectionState;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// **VALUE**: Verifies the authenticated upgrade: bearer header present,
/// room in the query string, connected event emitted.
///
/// **WHY THIS MATTERS**: The server rejects upgrades without the bearer
/// token; the room query is how it places the socket. Either one silently
/// wrong means "connected but deaf".
#[tokio::test]
async fn given_token_when_connecting_then_upgrade_authenticated_and_event_emitted() {
    // GIVEN: A chat server and an authenticated client
    let mut harness = spawn_chat_server(vec![], false).await;
    let (sink, mut events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);

    // WHEN: Connecting
    client.connect(&harness.base_url, "one-piece").await.unwrap();

    // THEN: Upgrade carried auth + room, connected event fired
    let upgrade = recv_within(&mut harness.upgrades, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(upgrade.authorization.as_deref(), Some("Bearer jwt-abc"));
    assert!(upgrade.uri.contains("/ws/chat?room=one-piece"));

    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::ChatConnected(room) => assert_eq!(room, "one-piece"),
        other => panic!("expected ChatConnected, got {other:?}"),
    }
    assert!(client.is_connected().await);
    assert_eq!(client.current_room().await.as_deref(), Some("one-piece"));

    client.disconnect().await;
}

/// **VALUE**: Verifies the missing-token path fails before any socket is
/// opened.
#[tokio::test]
async fn given_no_token_when_connecting_then_unauthenticated_and_no_socket() {
    // GIVEN: A logged-out client
    let harness = spawn_chat_server(vec![], false).await;
    let (sink, _events) = channel_sink();
    let client = ChatClient::new(Arc::new(StaticTokenProvider::logged_out()), sink);

    // WHEN
    let result = client.connect(&harness.base_url, "one-piece").await;

    // THEN
    assert!(matches!(result, Err(ChatError::Unauthenticated { .. })));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.accepts.load(Ordering::SeqCst), 0);
    assert!(!client.is_connected().await);
}

/// **VALUE**: Verifies the connecting guard: a second connect while one is
/// in flight returns AlreadyInProgress and opens no extra socket.
///
/// **WHY THIS MATTERS**: Rapid room clicks in the UI fire overlapping
/// connects. Without the guard, two read loops end up emitting interleaved
/// events to the same sink.
///
/// **BUG THIS CATCHES**: Would catch the is_connecting flag being cleared
/// too early (before the grace period), re-opening the double-loop race.
#[tokio::test]
async fn given_connect_in_flight_when_connecting_again_then_already_in_progress() {
    // GIVEN: A connect underway (it sits in the 300 ms grace period)
    let harness = spawn_chat_server(vec![], false).await;
    let (sink, _events) = channel_sink();
    let client = Arc::new(ChatClient::new(token_provider("jwt-abc"), sink));

    let first = {
        let client = Arc::clone(&client);
        let base_url = harness.base_url.clone();
        tokio::spawn(async move { client.connect(&base_url, "one-piece").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // WHEN: A second connect while the first is in flight
    let second = client.connect(&harness.base_url, "bleach").await;

    // THEN: Rejected, first connect wins, exactly one socket
    assert!(matches!(second, Err(ChatError::AlreadyInProgress { .. })));
    first.await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.accepts.load(Ordering::SeqCst), 1);
    assert_eq!(client.current_room().await.as_deref(), Some("one-piece"));

    client.disconnect().await;
}

/// **VALUE**: Verifies inbound frames are decoded and the nested payload
/// unwrap works over a live socket.
#[tokio::test]
async fn given_wrapped_frame_when_received_then_inner_fields_surface() {
    // GIVEN: A server sending a relayed (wrapped) frame and a plain-text one
    let wrapped = serde_json::json!({
        "type": "chat",
        "room": "one-piece",
        "message": "{\"username\":\"bob\",\"message\":\"hi\"}",
        "timestamp": 1730541330,
    })
    .to_string();
    let harness = spawn_chat_server(vec![wrapped, "luffy joined".to_string()], false).await;
    let (sink, mut events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);

    // WHEN: Connecting
    client.connect(&harness.base_url, "one-piece").await.unwrap();

    // THEN: connected, then the unwrapped message, then the synthesized one
    assert!(matches!(
        recv_within(&mut events, Duration::from_secs(2)).await.unwrap(),
        SinkEvent::ChatConnected(_)
    ));
    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::ChatMessage(message) => {
            assert_eq!(message.message, "hi");
            assert_eq!(message.username, "bob");
            assert_eq!(message.room, "one-piece");
        }
        other => panic!("expected ChatMessage, got {other:?}"),
    }
    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::ChatMessage(message) => {
            assert_eq!(message.kind, "chat");
            assert_eq!(message.message, "luffy joined");
        }
        other => panic!("expected ChatMessage, got {other:?}"),
    }

    client.disconnect().await;
}

/// **VALUE**: Verifies outbound messages are raw text frames with no JSON
/// envelope.
///
/// **WHY THIS MATTERS**: The send path is deliberately asymmetric with
/// receive - the server wraps bare text itself. An envelope on send would
/// double-wrap every message for other participants.
#[tokio::test]
async fn given_connected_client_when_sending_then_raw_text_frame_on_wire() {
    // GIVEN: A connected client
    let mut harness = spawn_chat_server(vec![], false).await;
    let (sink, _events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);
    client.connect(&harness.base_url, "one-piece").await.unwrap();

    // WHEN: Sending
    client.send_message("hello there").await.unwrap();

    // THEN: The wire carried the bare text
    let frame = recv_within(&mut harness.inbound, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(frame, "hello there");

    client.disconnect().await;
}

/// **VALUE**: Verifies send before connect fails NotConnected.
#[tokio::test]
async fn given_disconnected_client_when_sending_then_not_connected() {
    // GIVEN: A client that never connected
    let (sink, _events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);

    // WHEN / THEN
    let result = client.send_message("hello").await;
    assert!(matches!(result, Err(ChatError::NotConnected { .. })));
}

/// **VALUE**: Verifies switch_room before any connect fails with the
/// documented message.
#[tokio::test]
async fn given_never_connected_client_when_switching_room_then_fails() {
    // GIVEN
    let (sink, _events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);

    // WHEN
    let result = client.switch_room("bleach").await;

    // THEN
    match result.unwrap_err() {
        ChatError::NotConnected { message, .. } => {
            assert_eq!(message, "no previous connection established");
        }
        other => panic!("expected NotConnected, got {other:?}"),
    }
}

/// **VALUE**: Verifies switch_room reuses the stored base URL and replaces
/// the connection.
#[tokio::test]
async fn given_connected_client_when_switching_room_then_new_upgrade_for_new_room() {
    // GIVEN: A client connected to one room
    let mut harness = spawn_chat_server(vec![], false).await;
    let (sink, mut events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);
    client.connect(&harness.base_url, "one-piece").await.unwrap();
    let _ = recv_within(&mut harness.upgrades, Duration::from_secs(2)).await;

    // WHEN: Switching rooms
    client.switch_room("bleach").await.unwrap();

    // THEN: A fresh upgrade for the new room on the same base URL
    let upgrade = recv_within(&mut harness.upgrades, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(upgrade.uri.contains("room=bleach"));
    assert_eq!(harness.accepts.load(Ordering::SeqCst), 2);
    assert_eq!(client.current_room().await.as_deref(), Some("bleach"));

    // AND: Both connects reported their event
    let mut connected_rooms = Vec::new();
    while let Some(event) = recv_within(&mut events, Duration::from_millis(300)).await {
        if let SinkEvent::ChatConnected(room) = event {
            connected_rooms.push(room);
        }
    }
    assert_eq!(connected_rooms, vec!["one-piece", "bleach"]);

    client.disconnect().await;
}

/// **VALUE**: Verifies a server-side close surfaces as exactly one
/// disconnected event and flips the state.
///
/// **WHY THIS MATTERS**: The disconnect event is the only signal the UI gets
/// that the room went away - there is no deadline on this transport, so a
/// missed close means a chat that looks alive forever.
#[tokio::test]
async fn given_server_close_when_reading_then_disconnected_event_and_state_flip() {
    // GIVEN: A server that sends one frame then closes
    let canned = vec![serde_json::json!({"type": "chat", "message": "bye", "timestamp": 1})
        .to_string()];
    let harness = spawn_chat_server(canned, true).await;
    let (sink, mut events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);

    // WHEN: Connecting and letting the server close
    client.connect(&harness.base_url, "one-piece").await.unwrap();

    // THEN: connected -> message -> disconnected
    assert!(matches!(
        recv_within(&mut events, Duration::from_secs(2)).await.unwrap(),
        SinkEvent::ChatConnected(_)
    ));
    assert!(matches!(
        recv_within(&mut events, Duration::from_secs(2)).await.unwrap(),
        SinkEvent::ChatMessage(_)
    ));
    assert!(matches!(
        recv_within(&mut events, Duration::from_secs(2)).await.unwrap(),
        SinkEvent::ChatDisconnected
    ));

    // AND: State reflects the loss; no second disconnected event
    for _ in 0..20 {
        if client.state().await == ConnectionState::Disconnected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert!(recv_within(&mut events, Duration::from_millis(200)).await.is_none());
}

/// **VALUE**: Verifies disconnect is idempotent and clears the room.
#[tokio::test]
async fn given_connected_client_when_disconnecting_twice_then_noop() {
    // GIVEN: A connected client
    let harness = spawn_chat_server(vec![], false).await;
    let (sink, _events) = channel_sink();
    let client = ChatClient::new(token_provider("jwt-abc"), sink);
    client.connect(&harness.base_url, "one-piece").await.unwrap();

    // WHEN: Disconnecting twice
    client.disconnect().await;
    client.disconnect().await;

    // THEN
    assert!(!client.is_connected().await);
    assert_eq!(client.current_room().await, None);
}
