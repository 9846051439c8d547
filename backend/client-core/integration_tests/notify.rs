// Public API tests for notification registration, subscription and the
// background UDP listener.

use crate::helpers::{recv_within, spawn_silent_udp, spawn_udp_replier};

use client_core::error::notify::NotifyError;
use client_core::notify::{listener, register, subscribe};

use common::{Notification, RedactedToken, ServerEndpointBuilder};

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::unbounded_channel;

fn endpoint_for(addr: SocketAddr) -> common::ServerEndpoint {
    ServerEndpointBuilder::default()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .build()
        .unwrap()
}

fn token() -> RedactedToken {
    RedactedToken::new("jwt-abc".to_string())
}

/// **VALUE**: Verifies the register exchange end to end - request shape on
/// the wire and acceptance of the success ack.
///
/// **WHY THIS MATTERS**: The server only pushes notifications to clients it
/// saw register with a valid token; a malformed request means silent
/// no-notifications forever.
#[tokio::test]
async fn given_success_ack_when_registering_then_ok_and_request_well_formed() {
    // GIVEN: A server acking with success
    let (addr, mut requests) =
        spawn_udp_replier(serde_json::json!({"status": "success", "payload": ""})).await;

    // WHEN: Registering
    let result = register(&endpoint_for(addr), &token()).await;

    // THEN: Ok, and the request carried action + token
    result.unwrap();
    let request = recv_within(&mut requests, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(request["type"], "MANGAHUB_REQUEST");
    assert_eq!(request["action"], "register");
    assert_eq!(request["token"], "jwt-abc");
}

/// **VALUE**: Verifies a non-success ack surfaces as Rejected with the
/// server's payload.
///
/// **WHY THIS MATTERS**: "invalid token" from the server must reach the user
/// as-is so they know to re-login, instead of being flattened into a generic
/// failure.
#[tokio::test]
async fn given_error_ack_when_registering_then_rejected_with_payload() {
    // GIVEN: A server rejecting the registration
    let (addr, _requests) =
        spawn_udp_replier(serde_json::json!({"status": "error", "payload": "invalid token"}))
            .await;

    // WHEN
    let result = register(&endpoint_for(addr), &token()).await;

    // THEN
    match result.unwrap_err() {
        NotifyError::Rejected { payload, .. } => assert_eq!(payload, "invalid token"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

/// **VALUE**: Verifies the subscribe ack deadline (2 s) fires on silence.
///
/// **WHY THIS MATTERS**: Subscribe runs on a user interaction; an unbounded
/// wait would hang the action indefinitely when the server is gone.
#[tokio::test]
async fn given_silent_server_when_subscribing_then_times_out() {
    // GIVEN: A server that never acks
    let addr = spawn_silent_udp().await;

    // WHEN
    let result = subscribe(&endpoint_for(addr), &token(), "one-piece").await;

    // THEN
    assert!(matches!(result, Err(NotifyError::Timeout { .. })));
}

/// **VALUE**: Verifies subscribe puts the manga id in the payload field.
#[tokio::test]
async fn given_success_ack_when_subscribing_then_payload_is_manga_id() {
    // GIVEN
    let (addr, mut requests) =
        spawn_udp_replier(serde_json::json!({"status": "success", "payload": ""})).await;

    // WHEN
    subscribe(&endpoint_for(addr), &token(), "one-piece")
        .await
        .unwrap();

    // THEN
    let request = recv_within(&mut requests, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(request["action"], "subscribe");
    assert_eq!(request["payload"], "one-piece");
}

/// **VALUE**: Verifies an empty manga id is rejected locally without any
/// network traffic.
#[tokio::test]
async fn given_empty_manga_id_when_subscribing_then_rejected_locally() {
    // GIVEN: A server that would record any request
    let (addr, mut requests) =
        spawn_udp_replier(serde_json::json!({"status": "success", "payload": ""})).await;

    // WHEN
    let result = subscribe(&endpoint_for(addr), &token(), "").await;

    // THEN: Rejected, and nothing reached the server
    assert!(matches!(result, Err(NotifyError::Rejected { .. })));
    assert!(recv_within(&mut requests, Duration::from_millis(200))
        .await
        .is_none());
}

/// **VALUE**: Verifies the listener loop decodes datagrams, survives
/// malformed ones, and stops delivering after stop().
///
/// **WHY THIS MATTERS**: This is the full lifecycle of the one long-lived
/// UDP socket in the process. A malformed datagram killing the loop would
/// silently end notifications until restart; a leaky stop would deliver
/// events into a torn-down session.
#[tokio::test]
async fn given_running_listener_when_datagrams_arrive_then_only_valid_ones_dispatch() {
    // GIVEN: A listener on an ephemeral port forwarding into a channel
    let (tx, mut rx) = unbounded_channel::<Notification>();
    let handle = listener::start(0, move |notification| {
        let _ = tx.send(notification);
    })
    .await
    .unwrap();
    let target = handle.local_addr();

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let destination = format!("127.0.0.1:{}", target.port());

    // WHEN: A malformed datagram, then a valid one
    sender.send_to(b"not json", destination.as_str()).await.unwrap();
    sender
        .send_to(
            br#"{"manga_id":"bleach","chapter":686,"timestamp":"2025-11-02T10:15:30Z"}"#,
            destination.as_str(),
        )
        .await
        .unwrap();

    // THEN: Only the valid one arrives, loop still alive
    let notification = recv_within(&mut rx, Duration::from_secs(2)).await.unwrap();
    assert_eq!(notification.manga_id, "bleach");
    assert_eq!(notification.chapter, 686);
    assert!(!handle.is_finished(), "malformed datagram must not stop the loop");

    // WHEN: Stopping and sending again
    handle.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    sender
        .send_to(
            br#"{"manga_id":"naruto","chapter":700,"timestamp":""}"#,
            destination.as_str(),
        )
        .await
        .unwrap();

    // THEN: No further dispatch
    assert!(
        recv_within(&mut rx, Duration::from_millis(300)).await.is_none(),
        "stopped listener must not dispatch"
    );
}
