// Public API tests for the TCP sync client against an in-process server.
// Serial: the port and read-deadline overrides are process-wide state.

use crate::helpers::{channel_sink, recv_within, spawn_sync_server, token_provider, SinkEvent};

use client_core::credentials::StaticTokenProvider;
use client_core::error::sync::SyncError;
use client_core::sync::{
    clear_override_port, clear_override_read_deadline, set_override_port,
    set_override_read_deadline, SyncClient,
};

use common::ConnectionState;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tokio::net::TcpListener;

async fn wait_until_stopped(client: &SyncClient) {
    for _ in 0..50 {
        if !client.is_running().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("sync client never left the running state");
}

/// **VALUE**: Verifies the handshake line carries the token and the stable
/// per-instance device id.
///
/// **WHY THIS MATTERS**: The server keys progress state by device id; an id
/// that changes per connect would count every reconnect as a new device and
/// wreck the devices_synced stat.
#[tokio::test]
#[serial]
async fn given_server_when_connecting_then_handshake_carries_token_and_device_id() {
    // GIVEN: A sync server and a client
    let mut harness = spawn_sync_server(vec![]).await;
    set_override_port(harness.addr.port());

    let (sink, _events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);

    // WHEN: Connecting
    client.start_auto_connect("127.0.0.1").await.unwrap();

    // THEN: The handshake matches the client identity
    let handshake = recv_within(&mut harness.handshakes, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(handshake["token"], "jwt-abc");
    assert_eq!(handshake["device_id"], client.device_id());
    assert!(client.device_id().starts_with("device-"));

    client.stop().await;
    clear_override_port();
}

/// **VALUE**: Verifies start is idempotent while running - exactly one
/// connection is opened.
///
/// **WHY THIS MATTERS**: The coordinator and UI can both race into
/// start_auto_connect after discovery. Two live sessions would double every
/// broadcast and corrupt the server's device accounting.
///
/// **BUG THIS CATCHES**: Would catch the running-flag check being moved
/// after the dial, or dropped in a refactor.
#[tokio::test]
#[serial]
async fn given_running_client_when_starting_again_then_no_second_connection() {
    // GIVEN: A connected client
    let harness = spawn_sync_server(vec![]).await;
    set_override_port(harness.addr.port());

    let (sink, _events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);
    client.start_auto_connect("127.0.0.1").await.unwrap();

    // WHEN: Starting again
    client.start_auto_connect("127.0.0.1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // THEN: The server saw exactly one connection
    assert_eq!(harness.accepts.load(Ordering::SeqCst), 1);
    assert_eq!(client.state().await, ConnectionState::Connected);

    client.stop().await;
    clear_override_port();
}

/// **VALUE**: Verifies the missing-token path fails Unauthenticated without
/// touching the network.
#[tokio::test]
#[serial]
async fn given_no_token_when_starting_then_unauthenticated_and_no_dial() {
    // GIVEN: A logged-out provider
    let harness = spawn_sync_server(vec![]).await;
    set_override_port(harness.addr.port());

    let (sink, _events) = channel_sink();
    let client = SyncClient::new(Arc::new(StaticTokenProvider::logged_out()), sink);

    // WHEN
    let result = client.start_auto_connect("127.0.0.1").await;

    // THEN
    assert!(matches!(result, Err(SyncError::Unauthenticated { .. })));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.accepts.load(Ordering::SeqCst), 0);
    assert!(!client.is_running().await);

    clear_override_port();
}

/// **VALUE**: Verifies a refused dial surfaces as a Connection error and
/// leaves the client stopped.
#[tokio::test]
#[serial]
async fn given_no_server_when_starting_then_connection_error() {
    // GIVEN: A port with nothing listening (bound once, then released)
    let vacant = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = vacant.local_addr().unwrap().port();
    drop(vacant);
    set_override_port(port);

    let (sink, _events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);

    // WHEN
    let result = client.start_auto_connect("127.0.0.1").await;

    // THEN
    assert!(matches!(result, Err(SyncError::Connection { .. })));
    assert!(!client.is_running().await);
    assert_eq!(client.state().await, ConnectionState::Disconnected);

    clear_override_port();
}

/// **VALUE**: Verifies broadcast delivery to the sink in wire order.
#[tokio::test]
#[serial]
async fn given_broadcasts_on_stream_when_running_then_sink_receives_in_order() {
    // GIVEN: A server scripted to send two broadcasts
    let first = serde_json::json!({
        "type": "progress_update",
        "manga_id": "one-piece",
        "manga_title": "One Piece",
        "previous_chapter": 1089,
        "current_chapter": 1090,
        "updated_at": "2025-11-02T10:15:30Z",
        "devices_synced": 3,
        "total_chapters_read": 412,
        "reading_streak": 9,
    });
    let second = serde_json::json!({"manga_id": "berserk", "current_chapter": 364});
    let harness = spawn_sync_server(vec![
        (Duration::from_millis(50), first.to_string()),
        (Duration::from_millis(50), second.to_string()),
    ])
    .await;
    set_override_port(harness.addr.port());

    let (sink, mut events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);
    client.start_auto_connect("127.0.0.1").await.unwrap();

    // WHEN / THEN: Both arrive, in order
    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::SyncProgress(broadcast) => {
            assert_eq!(broadcast.manga_id, "one-piece");
            assert_eq!(broadcast.current_chapter, 1090);
            assert_eq!(broadcast.devices_synced, 3);
        }
        other => panic!("expected SyncProgress, got {other:?}"),
    }
    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::SyncProgress(broadcast) => assert_eq!(broadcast.manga_id, "berserk"),
        other => panic!("expected SyncProgress, got {other:?}"),
    }

    client.stop().await;
    clear_override_port();
}

/// **VALUE**: Verifies the rolling read deadline is a keep-alive timeout,
/// not a failure: the loop survives several silent deadline cycles and still
/// decodes the next broadcast.
///
/// **WHY THIS MATTERS**: Sync traffic is bursty - a reader may be idle for
/// hours. Treating the deadline as fatal would turn every quiet stretch into
/// a disconnect.
#[tokio::test]
#[serial]
async fn given_idle_stream_when_deadline_expires_then_loop_survives() {
    // GIVEN: A tiny read deadline and a broadcast scheduled well past it
    set_override_read_deadline(Duration::from_millis(100));
    let broadcast = serde_json::json!({"manga_id": "one-piece", "current_chapter": 1090});
    let harness =
        spawn_sync_server(vec![(Duration::from_millis(450), broadcast.to_string())]).await;
    set_override_port(harness.addr.port());

    let (sink, mut events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);
    client.start_auto_connect("127.0.0.1").await.unwrap();

    // WHEN: Sitting through several deadline cycles
    tokio::time::sleep(Duration::from_millis(350)).await;

    // THEN: Still running, and the late broadcast arrives
    assert!(client.is_running().await, "deadline expiry must not stop the loop");
    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::SyncProgress(received) => assert_eq!(received.manga_id, "one-piece"),
        other => panic!("expected SyncProgress, got {other:?}"),
    }

    client.stop().await;
    clear_override_port();
    clear_override_read_deadline();
}

/// **VALUE**: Verifies a genuine decode error terminates the loop and clears
/// the running state.
///
/// **WHY THIS MATTERS**: After garbage on a stream decoder there is no
/// resynchronization point; limping on would misparse every subsequent
/// frame. The state flip is what lets the caller decide to reconnect.
#[tokio::test]
#[serial]
async fn given_garbage_on_stream_when_decoding_then_loop_stops_and_state_clears() {
    // GIVEN: A server scripted to send a non-JSON line
    let harness =
        spawn_sync_server(vec![(Duration::from_millis(50), "not json".to_string())]).await;
    set_override_port(harness.addr.port());

    let (sink, _events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);
    client.start_auto_connect("127.0.0.1").await.unwrap();

    // WHEN / THEN: The loop exits and flips state
    wait_until_stopped(&client).await;
    assert_eq!(client.state().await, ConnectionState::Disconnected);

    clear_override_port();
}

/// **VALUE**: Verifies stop is idempotent and a stopped client can connect
/// again with a fresh socket.
#[tokio::test]
#[serial]
async fn given_stopped_client_when_stopping_again_then_noop_and_restartable() {
    // GIVEN: A connected client
    let harness = spawn_sync_server(vec![]).await;
    set_override_port(harness.addr.port());

    let (sink, _events) = channel_sink();
    let client = SyncClient::new(token_provider("jwt-abc"), sink);
    client.start_auto_connect("127.0.0.1").await.unwrap();

    // WHEN: Stopping twice
    client.stop().await;
    client.stop().await;
    assert!(!client.is_running().await);

    // THEN: A new start opens a second connection
    client.start_auto_connect("127.0.0.1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.accepts.load(Ordering::SeqCst), 2);

    client.stop().await;
    clear_override_port();
}
