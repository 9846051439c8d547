// Unit tests for the UDP control envelopes - the exact JSON the server sees.

use crate::protocol::{ControlReply, ControlRequest};

use common::RedactedToken;

/// **VALUE**: Verifies the discovery request carries all four envelope fields
/// with the right type tag.
///
/// **WHY THIS MATTERS**: The server routes on `type`; older server builds
/// also require the unused fields to be present. Dropping one breaks
/// discovery against deployed backends.
#[test]
fn given_discover_request_when_encoded_then_all_envelope_fields_present() {
    // GIVEN / WHEN: Encoding a discovery request
    let encoded = serde_json::to_value(ControlRequest::discover()).unwrap();

    // THEN: Full envelope with the discovery type tag
    assert_eq!(encoded["type"], "DISCOVER_MANGAHUB");
    assert_eq!(encoded["action"], "");
    assert_eq!(encoded["token"], "");
    assert_eq!(encoded["payload"], "");
}

/// **VALUE**: Verifies the register request shape.
///
/// **BUG THIS CATCHES**: Would catch a field rename (e.g. `token` ->
/// `jwt`) that the server would silently ignore, leaving the client
/// unregistered while the call appears to succeed locally.
#[test]
fn given_register_request_when_encoded_then_action_and_token_set() {
    // GIVEN: A token
    let token = RedactedToken::new("jwt-123".to_string());

    // WHEN: Encoding the register request
    let encoded = serde_json::to_value(ControlRequest::register(&token)).unwrap();

    // THEN
    assert_eq!(encoded["type"], "MANGAHUB_REQUEST");
    assert_eq!(encoded["action"], "register");
    assert_eq!(encoded["token"], "jwt-123");
    assert_eq!(encoded["payload"], "");
}

/// **VALUE**: Verifies the subscribe request puts the manga id in payload.
#[test]
fn given_subscribe_request_when_encoded_then_payload_is_manga_id() {
    // GIVEN: A token and manga id
    let token = RedactedToken::new("jwt-123".to_string());

    // WHEN: Encoding the subscribe request
    let encoded = serde_json::to_value(ControlRequest::subscribe(&token, "one-piece")).unwrap();

    // THEN
    assert_eq!(encoded["type"], "MANGAHUB_REQUEST");
    assert_eq!(encoded["action"], "subscribe");
    assert_eq!(encoded["payload"], "one-piece");
}

/// **VALUE**: Verifies a reply with missing fields still decodes.
///
/// **WHY THIS MATTERS**: Some server error paths answer with a bare
/// `{"status":"error"}`. A decode failure there would misreport the
/// rejection as a protocol error.
#[test]
fn given_minimal_reply_when_decoded_then_fields_default() {
    // GIVEN: A reply without payload
    let reply: ControlReply = serde_json::from_str(r#"{"status":"error"}"#).unwrap();

    // THEN
    assert_eq!(reply.status, "error");
    assert_eq!(reply.payload, "");
}
