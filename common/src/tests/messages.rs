use crate::{ChatMessage, Notification, ProgressBroadcast};

/// **VALUE**: Verifies a full progress broadcast decodes with every field.
///
/// **WHY THIS MATTERS**: This is the exact shape the sync server writes, one
/// JSON value per stream message. A field rename here silently zeroes stats
/// in the UI.
#[test]
fn given_full_broadcast_json_when_decoded_then_all_fields_populated() {
    // GIVEN: A complete broadcast as the server sends it
    let raw = r#"{
        "type": "progress_update",
        "manga_id": "one-piece",
        "manga_title": "One Piece",
        "previous_chapter": 1089,
        "current_chapter": 1090,
        "updated_at": "2025-11-02T10:15:30Z",
        "devices_synced": 3,
        "total_chapters_read": 412,
        "reading_streak": 9
    }"#;

    // WHEN: Decoding
    let broadcast: ProgressBroadcast = serde_json::from_str(raw).unwrap();

    // THEN: Every field round-trips
    assert_eq!(broadcast.kind, "progress_update");
    assert_eq!(broadcast.manga_id, "one-piece");
    assert_eq!(broadcast.current_chapter, 1090);
    assert_eq!(broadcast.devices_synced, 3);
    assert_eq!(broadcast.reading_streak, 9);
}

/// **VALUE**: Verifies a minimal broadcast decodes with defaults.
///
/// **BUG THIS CATCHES**: Older servers omit the streak/total fields; a missing
/// `#[serde(default)]` would turn every such broadcast into a fatal decode
/// error and kill the sync read loop.
#[test]
fn given_minimal_broadcast_json_when_decoded_then_missing_fields_default() {
    // GIVEN: Only the required manga_id
    let raw = r#"{"manga_id":"berserk"}"#;

    // WHEN: Decoding
    let broadcast: ProgressBroadcast = serde_json::from_str(raw).unwrap();

    // THEN: Absent fields default instead of failing
    assert_eq!(broadcast.manga_id, "berserk");
    assert_eq!(broadcast.current_chapter, 0);
    assert_eq!(broadcast.updated_at, "");
}

/// **VALUE**: Verifies notification datagram decoding.
#[test]
fn given_notification_json_when_decoded_then_fields_populated() {
    // GIVEN: A datagram payload
    let raw = r#"{"manga_id":"bleach","chapter":686,"timestamp":"2025-11-02T10:15:30Z"}"#;

    // WHEN: Decoding
    let notification: Notification = serde_json::from_str(raw).unwrap();

    // THEN
    assert_eq!(notification.manga_id, "bleach");
    assert_eq!(notification.chapter, 686);
}

/// **VALUE**: Verifies optional chat fields are omitted on output and
/// defaulted on input.
///
/// **WHY THIS MATTERS**: System frames (join/leave, presence) carry no
/// user_id; serializing `"user_id":null` confuses the frontend bridge, and
/// failing on its absence would drop every system frame.
#[test]
fn given_system_chat_frame_when_round_tripped_then_optionals_behave() {
    // GIVEN: A system frame without user fields
    let raw = r#"{"type":"system","room":"one-piece","message":"bob joined","timestamp":1730541330}"#;

    // WHEN: Decoding then re-encoding
    let message: ChatMessage = serde_json::from_str(raw).unwrap();
    let encoded = serde_json::to_string(&message).unwrap();

    // THEN: Optionals defaulted in, omitted out
    assert_eq!(message.user_id, None);
    assert_eq!(message.username, "");
    assert!(!encoded.contains("user_id"), "None user_id must be omitted");
    assert!(!encoded.contains("username"), "Empty username must be omitted");
}
