// Public API tests for UDP discovery against in-process mock servers.
// Serial: the broadcast override is process-wide state.

use crate::helpers::{spawn_silent_udp, spawn_udp_replier};

use client_core::discovery::{clear_override_broadcast_addr, discover, set_override_broadcast_addr};
use client_core::error::discovery::DiscoveryError;

use std::time::{Duration, Instant};

use serial_test::serial;

/// **VALUE**: Verifies the discovery happy path end to end over a real UDP
/// socket pair.
///
/// **WHY THIS MATTERS**: Everything downstream (registration, sync, chat)
/// keys off the endpoint this returns. The host/port must come from the
/// offer body, not from the replying socket's address.
///
/// **BUG THIS CATCHES**: Would catch the endpoint being built from the
/// packet source instead of the offer fields - invisible in unit tests,
/// fatal behind NAT or when the backend advertises a different interface.
#[tokio::test]
#[serial]
async fn given_valid_offer_when_discovering_then_endpoint_matches_offer() {
    // GIVEN: A replier that offers a host/port unrelated to its own socket
    let (addr, mut requests) = spawn_udp_replier(serde_json::json!({
        "type": "MANGAHUB_OFFER",
        "name": "srv1",
        "host": "10.0.0.5",
        "port": 9092,
    }))
    .await;
    set_override_broadcast_addr(addr);

    // WHEN: Discovering
    let result = discover(Duration::from_secs(1)).await;
    clear_override_broadcast_addr();

    // THEN: The endpoint mirrors the offer body
    let endpoint = result.unwrap();
    assert_eq!(endpoint.to_string(), "10.0.0.5:9092");

    // AND: The request on the wire was a full discovery envelope
    let request = requests.recv().await.unwrap();
    assert_eq!(request["type"], "DISCOVER_MANGAHUB");
}

/// **VALUE**: Verifies a reply with the wrong type is a protocol error, not
/// an accepted endpoint.
///
/// **WHY THIS MATTERS**: Anything may answer on a broadcast domain. Treating
/// an arbitrary datagram as an offer would point every transport at a
/// stranger's machine.
#[tokio::test]
#[serial]
async fn given_wrong_reply_type_when_discovering_then_protocol_error() {
    // GIVEN: A replier with the wrong type tag
    let (addr, _requests) = spawn_udp_replier(serde_json::json!({
        "type": "SOMETHING_ELSE",
        "host": "10.0.0.5",
        "port": 9092,
    }))
    .await;
    set_override_broadcast_addr(addr);

    // WHEN: Discovering
    let result = discover(Duration::from_secs(1)).await;
    clear_override_broadcast_addr();

    // THEN
    assert!(matches!(result, Err(DiscoveryError::Protocol { .. })));
}

/// **VALUE**: Verifies silence fails with Timeout within the requested
/// window plus a small epsilon.
///
/// **WHY THIS MATTERS**: The coordinator calls this on the startup path; a
/// discovery that hangs past its timeout freezes session bring-up. There is
/// deliberately no internal retry to blow the bound.
#[tokio::test]
#[serial]
async fn given_no_responder_when_discovering_then_times_out_within_bound() {
    // GIVEN: A socket that never answers
    let addr = spawn_silent_udp().await;
    set_override_broadcast_addr(addr);

    // WHEN: Discovering with a short timeout
    let started = Instant::now();
    let result = discover(Duration::from_millis(200)).await;
    let elapsed = started.elapsed();
    clear_override_broadcast_addr();

    // THEN: Timeout error, and promptly
    assert!(matches!(result, Err(DiscoveryError::Timeout { .. })));
    assert!(
        elapsed < Duration::from_millis(700),
        "timeout must not overshoot: {elapsed:?}"
    );
}

/// **VALUE**: Verifies an unparseable reply is a protocol error.
#[tokio::test]
#[serial]
async fn given_garbage_reply_when_discovering_then_protocol_error() {
    // GIVEN: A replier emitting a JSON value that is not an offer object
    let (addr, _requests) = spawn_udp_replier(serde_json::json!("nonsense")).await;
    set_override_broadcast_addr(addr);

    // WHEN
    let result = discover(Duration::from_secs(1)).await;
    clear_override_broadcast_addr();

    // THEN
    assert!(matches!(result, Err(DiscoveryError::Protocol { .. })));
}
