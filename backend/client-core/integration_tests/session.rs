// End-to-end tests for the session coordinator: discovery, registration,
// listener lifecycle and background sync start against mock servers.
// Serial: discovery/sync overrides and the fixed listener port are
// process-wide state.

use crate::helpers::{
    channel_sink, recv_within, spawn_control_server, spawn_sync_server, token_provider, SinkEvent,
};

use client_core::credentials::StaticTokenProvider;
use client_core::discovery::{clear_override_broadcast_addr, set_override_broadcast_addr};
use client_core::session::SessionCoordinator;
use client_core::sync::{clear_override_port, set_override_port, SyncClient};

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tokio::net::UdpSocket;

const LISTEN_PORT: u16 = 39302;

fn coordinator(
    sync: Arc<SyncClient>,
    provider: Arc<StaticTokenProvider>,
    sink: Arc<crate::helpers::ChannelSink>,
    config_dir: &std::path::Path,
) -> SessionCoordinator {
    SessionCoordinator::new(sync, provider, sink, config_dir.to_path_buf())
        .with_listen_port(LISTEN_PORT)
}

/// **VALUE**: Verifies the full bring-up sequence: discover, register (acked
/// before listening), notification delivery, background sync handshake, and
/// that stop() closes the listener socket.
///
/// **WHY THIS MATTERS**: This is the one place the three transports are
/// sequenced. The register-then-listen order and the post-stop silence are
/// exactly the properties a refactor is most likely to break.
///
/// **BUG THIS CATCHES**: Would catch the listener being started before the
/// register ack (dropped first notification), and a stop() that leaves the
/// socket dispatching into a dead session.
#[tokio::test]
#[serial]
async fn given_mock_backend_when_starting_session_then_full_sequence_runs() {
    // GIVEN: A combined discovery/control server and a sync server
    let (control_addr, mut control_requests) =
        spawn_control_server(serde_json::json!({"status": "success", "payload": ""})).await;
    set_override_broadcast_addr(control_addr);

    let mut sync_harness = spawn_sync_server(vec![]).await;
    set_override_port(sync_harness.addr.port());

    let config_dir = tempfile::tempdir().unwrap();
    let (sink, mut events) = channel_sink();
    let provider = token_provider("jwt-abc");
    let sync = Arc::new(SyncClient::new(provider.clone(), sink.clone()));
    let session = coordinator(sync.clone(), provider, sink, config_dir.path());

    // WHEN: Starting the session
    session.start().await.unwrap();
    assert!(session.is_running().await);

    // THEN: The server saw discovery then registration, in that order
    let first = recv_within(&mut control_requests, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(first["type"], "DISCOVER_MANGAHUB");
    let second = recv_within(&mut control_requests, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(second["action"], "register");
    assert_eq!(second["token"], "jwt-abc");

    // AND: The endpoint was persisted as the canonical address
    let cached = client_core::cache::load_endpoint(config_dir.path()).unwrap();
    assert_eq!(cached.host, "127.0.0.1");
    assert_eq!(cached.port, control_addr.port());

    // AND: A datagram to the listener port reaches the sink
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let listener_addr = format!("127.0.0.1:{LISTEN_PORT}");
    sender
        .send_to(
            br#"{"manga_id":"one-piece","chapter":1090,"timestamp":"2025-11-02T10:15:30Z"}"#,
            listener_addr.as_str(),
        )
        .await
        .unwrap();
    match recv_within(&mut events, Duration::from_secs(2)).await.unwrap() {
        SinkEvent::Notification(notification) => {
            assert_eq!(notification.manga_id, "one-piece");
            assert_eq!(notification.chapter, 1090);
        }
        other => panic!("expected Notification, got {other:?}"),
    }

    // AND: The background sync start handshook after the settle delay
    let handshake = recv_within(&mut sync_harness.handshakes, Duration::from_secs(3))
        .await
        .unwrap();
    assert_eq!(handshake["token"], "jwt-abc");
    assert!(sync.is_running().await);

    // WHEN: Stopping the session and sending another datagram
    session.stop().await;
    assert!(!session.is_running().await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    sender
        .send_to(br#"{"manga_id":"bleach","chapter":1,"timestamp":""}"#, listener_addr.as_str())
        .await
        .unwrap();

    // THEN: The listener socket is closed - no callback fires
    assert!(
        recv_within(&mut events, Duration::from_millis(300)).await.is_none(),
        "stopped session must not dispatch notifications"
    );

    // AND: Stop deliberately leaves the sync client running
    assert!(sync.is_running().await, "session stop must not stop sync");
    sync.stop().await;

    clear_override_broadcast_addr();
    clear_override_port();
}

/// **VALUE**: Verifies the logged-out path is a successful no-op with zero
/// network traffic.
///
/// **WHY THIS MATTERS**: The host calls start() unconditionally on launch;
/// before first login this must not error (the UI treats errors as "server
/// down") and must not broadcast anything.
#[tokio::test]
#[serial]
async fn given_no_token_when_starting_session_then_ok_noop() {
    // GIVEN: A control server that would record any traffic
    let (control_addr, mut control_requests) =
        spawn_control_server(serde_json::json!({"status": "success", "payload": ""})).await;
    set_override_broadcast_addr(control_addr);

    let config_dir = tempfile::tempdir().unwrap();
    let (sink, _events) = channel_sink();
    let provider = Arc::new(StaticTokenProvider::logged_out());
    let sync = Arc::new(SyncClient::new(provider.clone(), sink.clone()));
    let session = coordinator(sync, provider, sink, config_dir.path());

    // WHEN: Starting without a token
    session.start().await.unwrap();

    // THEN: Not running, and the network stayed silent
    assert!(!session.is_running().await);
    assert!(
        recv_within(&mut control_requests, Duration::from_millis(300))
            .await
            .is_none(),
        "logged-out start must not touch the network"
    );

    clear_override_broadcast_addr();
}

/// **VALUE**: Verifies start is idempotent: a second call while running does
/// not rediscover or re-register.
#[tokio::test]
#[serial]
async fn given_running_session_when_starting_again_then_no_second_registration() {
    // GIVEN: A running session
    let (control_addr, mut control_requests) =
        spawn_control_server(serde_json::json!({"status": "success", "payload": ""})).await;
    set_override_broadcast_addr(control_addr);
    let sync_harness = spawn_sync_server(vec![]).await;
    set_override_port(sync_harness.addr.port());

    let config_dir = tempfile::tempdir().unwrap();
    let (sink, _events) = channel_sink();
    let provider = token_provider("jwt-abc");
    let sync = Arc::new(SyncClient::new(provider.clone(), sink.clone()));
    let session = coordinator(sync.clone(), provider, sink, config_dir.path());
    session.start().await.unwrap();

    let mut seen = 0;
    while recv_within(&mut control_requests, Duration::from_millis(300))
        .await
        .is_some()
    {
        seen += 1;
    }
    assert_eq!(seen, 2, "expected exactly discovery + registration");

    // WHEN: Starting again
    session.start().await.unwrap();

    // THEN: No further traffic
    assert!(
        recv_within(&mut control_requests, Duration::from_millis(300))
            .await
            .is_none(),
        "idempotent start must not re-register"
    );

    session.stop().await;
    sync.stop().await;
    clear_override_broadcast_addr();
    clear_override_port();
}

/// **VALUE**: Verifies a rejected registration fails start() and unwinds the
/// running flag, leaving the session restartable.
#[tokio::test]
#[serial]
async fn given_register_rejection_when_starting_then_error_and_unwound() {
    // GIVEN: A control server rejecting registrations
    let (control_addr, _requests) =
        spawn_control_server(serde_json::json!({"status": "error", "payload": "invalid token"}))
            .await;
    set_override_broadcast_addr(control_addr);

    let config_dir = tempfile::tempdir().unwrap();
    let (sink, _events) = channel_sink();
    let provider = token_provider("jwt-abc");
    let sync = Arc::new(SyncClient::new(provider.clone(), sink.clone()));
    let session = coordinator(sync, provider, sink, config_dir.path());

    // WHEN
    let result = session.start().await;

    // THEN
    assert!(result.is_err());
    assert!(!session.is_running().await);

    clear_override_broadcast_addr();
}

/// **VALUE**: Verifies subscribe() uses the cached endpoint and the current
/// token.
#[tokio::test]
#[serial]
async fn given_started_session_when_subscribing_then_request_reaches_server() {
    // GIVEN: A running session with a cached endpoint
    let (control_addr, mut control_requests) =
        spawn_control_server(serde_json::json!({"status": "success", "payload": ""})).await;
    set_override_broadcast_addr(control_addr);
    let sync_harness = spawn_sync_server(vec![]).await;
    set_override_port(sync_harness.addr.port());

    let config_dir = tempfile::tempdir().unwrap();
    let (sink, _events) = channel_sink();
    let provider = token_provider("jwt-abc");
    let sync = Arc::new(SyncClient::new(provider.clone(), sink.clone()));
    let session = coordinator(sync.clone(), provider, sink, config_dir.path());
    session.start().await.unwrap();
    while recv_within(&mut control_requests, Duration::from_millis(300))
        .await
        .is_some()
    {}

    // WHEN: Subscribing
    session.subscribe("one-piece").await.unwrap();

    // THEN: The subscribe request hit the cached endpoint
    let request = recv_within(&mut control_requests, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(request["action"], "subscribe");
    assert_eq!(request["payload"], "one-piece");

    session.stop().await;
    sync.stop().await;
    clear_override_broadcast_addr();
    clear_override_port();
}
