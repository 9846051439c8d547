//! Wire-facing payloads delivered by the three transports.
//!
//! All of these are ephemeral: one `Notification` per inbound UDP datagram,
//! one `ProgressBroadcast` per TCP stream message, one `ChatMessage` per
//! WebSocket frame. Fields the server may omit are defaulted so a partial
//! payload never fails the whole decode.

use serde::{Deserialize, Serialize};

/// A chapter-release notification received on the UDP listener port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub manga_id: String,
    #[serde(default)]
    pub chapter: i64,
    /// RFC 3339 timestamp as sent by the server.
    #[serde(default)]
    pub timestamp: String,
}

/// A multi-device reading-progress broadcast from the TCP sync stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBroadcast {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub manga_id: String,
    #[serde(default)]
    pub manga_title: String,
    #[serde(default)]
    pub previous_chapter: i64,
    #[serde(default)]
    pub current_chapter: i64,
    /// RFC 3339 timestamp as sent by the server.
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub devices_synced: i64,
    #[serde(default)]
    pub total_chapters_read: i64,
    #[serde(default)]
    pub reading_streak: i64,
}

/// One chat frame, inbound or synthesized.
///
/// Outbound chat traffic is raw text; this shape only ever goes *to* the
/// event sink. `user_id` and `online` stay optional because server system
/// messages (joins, presence counts) omit them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default)]
    pub message: String,
    /// Unix seconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<i64>,
}
