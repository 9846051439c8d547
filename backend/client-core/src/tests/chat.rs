// Unit tests for the chat frame decode pipeline (private functions).
// Live-socket behavior is covered in integration_tests/chat.rs.

use crate::chat::{decode_frame, unwrap_nested};

use common::ChatMessage;

/// **VALUE**: Verifies the nested-payload unwrap pulls inner fields up
/// exactly one level.
///
/// **WHY THIS MATTERS**: The server wraps relayed messages, so the text the
/// user typed arrives as JSON *inside* the outer message field. Without the
/// unwrap, the UI renders raw JSON to the user.
///
/// **BUG THIS CATCHES**: Would catch the unwrap being removed, or an override
/// rule regressing so the inner username/message no longer win.
#[test]
fn given_nested_payload_when_decoded_then_inner_fields_override_outer() {
    // GIVEN: An outer frame whose message field carries a JSON object
    let raw = r#"{"message":"{\"username\":\"bob\",\"message\":\"hi\"}"}"#;

    // WHEN: Running the full decode pipeline
    let message = decode_frame(raw);

    // THEN: Inner fields replaced the outer ones
    assert_eq!(message.message, "hi");
    assert_eq!(message.username, "bob");
}

/// **VALUE**: Verifies the unwrap is single-level, never recursive.
///
/// **WHY THIS MATTERS**: A doubly wrapped payload must surface the second
/// level as literal text. Recursing would let a malicious peer craft deeply
/// nested frames that burn CPU, and would change displayed content
/// depending on nesting depth.
///
/// **BUG THIS CATCHES**: Would catch someone "fixing" the unwrap into a loop.
#[test]
fn given_doubly_nested_payload_when_decoded_then_second_level_stays_literal() {
    // GIVEN: message -> JSON -> message -> JSON
    let second_level = r#"{"username":"eve","message":"deep"}"#;
    let first_level =
        serde_json::json!({"username": "bob", "message": second_level}).to_string();
    let raw = serde_json::json!({"message": first_level}).to_string();

    // WHEN: Decoding
    let message = decode_frame(&raw);

    // THEN: One unwrap happened, the second level is untouched text
    assert_eq!(message.username, "bob");
    assert!(
        message.message.starts_with('{'),
        "second level must remain literal JSON text, got: {}",
        message.message
    );
    assert!(message.message.contains("eve"));
}

/// **VALUE**: Verifies non-JSON payloads become synthesized chat messages
/// instead of being dropped.
///
/// **WHY THIS MATTERS**: Some server paths emit bare text (history replay,
/// system notices). Dropping them would silently lose chat content.
#[test]
fn given_plain_text_payload_when_decoded_then_chat_message_synthesized() {
    // GIVEN: A payload that is not JSON
    let raw = "server restarting in 5 minutes";

    // WHEN: Decoding
    let message = decode_frame(raw);

    // THEN: A chat-type message carrying the raw text with a fresh timestamp
    assert_eq!(message.kind, "chat");
    assert_eq!(message.message, raw);
    assert!(message.timestamp > 0, "fallback must stamp current time");
}

/// **VALUE**: Verifies a message that merely *starts* like JSON but fails the
/// inner decode is left as-is.
///
/// **BUG THIS CATCHES**: Would catch the unwrap clearing or mangling the
/// message when the inner parse fails.
#[test]
fn given_json_looking_text_when_inner_decode_fails_then_message_unchanged() {
    // GIVEN: An outer message whose text starts with '{' but is not JSON
    let outer = ChatMessage {
        kind: String::from("chat"),
        message: String::from("{not json at all"),
        username: String::from("alice"),
        timestamp: 7,
        ..ChatMessage::default()
    };

    // WHEN: Attempting the nested unwrap
    let message = unwrap_nested(outer);

    // THEN: Everything survives untouched
    assert_eq!(message.message, "{not json at all");
    assert_eq!(message.username, "alice");
    assert_eq!(message.timestamp, 7);
}

/// **VALUE**: Verifies empty inner fields do not clobber populated outer
/// fields.
///
/// **WHY THIS MATTERS**: The inner payload often carries only the text; the
/// outer envelope still owns room/user metadata. Overriding with empties
/// would anonymize every relayed message.
#[test]
fn given_partial_inner_payload_when_unwrapped_then_outer_fields_survive() {
    // GIVEN: Outer metadata plus an inner payload with only a message
    let outer = ChatMessage {
        kind: String::from("chat"),
        room: String::from("one-piece"),
        username: String::from("alice"),
        message: String::from(r#"{"message":"yo"}"#),
        timestamp: 99,
        ..ChatMessage::default()
    };

    // WHEN: Unwrapping
    let message = unwrap_nested(outer);

    // THEN: Inner message won, outer metadata survived
    assert_eq!(message.message, "yo");
    assert_eq!(message.username, "alice");
    assert_eq!(message.room, "one-piece");
    assert_eq!(message.timestamp, 99);
}
