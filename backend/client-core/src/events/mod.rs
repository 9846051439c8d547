//! Event delivery seam between the transport clients and the hosting
//! application.
//!
//! The clients never talk to a UI runtime directly; they are handed an
//! [`EventSink`] at construction and forward every decoded payload through
//! it. Hosts bridging to a string-keyed event bus can use the exported event
//! name constants.

use common::{ChatMessage, Notification, ProgressBroadcast};

use log::info;

pub const NOTIFY_MANGA_EVENT: &str = "notify:manga";
pub const SYNC_PROGRESS_EVENT: &str = "sync:progress";
pub const CHAT_MESSAGE_EVENT: &str = "chat:message";
pub const CHAT_CONNECTED_EVENT: &str = "chat:connected";
pub const CHAT_DISCONNECTED_EVENT: &str = "chat:disconnected";

/// Consumer of decoded transport events.
///
/// Implementations must be cheap and non-blocking - every method is invoked
/// from a transport read loop, and a stalled sink stalls that transport.
/// Within one transport, calls arrive in wire order; across transports no
/// ordering is guaranteed.
pub trait EventSink: Send + Sync {
    /// `notify:manga` - a chapter-release notification arrived on the UDP
    /// listener.
    fn notification(&self, notification: &Notification);

    /// `sync:progress` - a progress broadcast arrived on the TCP sync stream.
    fn sync_progress(&self, broadcast: &ProgressBroadcast);

    /// `chat:message` - a chat frame was decoded (or synthesized from a
    /// plain-text payload).
    fn chat_message(&self, message: &ChatMessage);

    /// `chat:connected` - a chat connection was established for `room`.
    fn chat_connected(&self, room: &str);

    /// `chat:disconnected` - the chat read loop exited.
    fn chat_disconnected(&self);
}

/// Sink that logs every event. Useful as a default for headless hosts.
pub struct LogSink;

impl EventSink for LogSink {
    fn notification(&self, notification: &Notification) {
        info!(
            "{NOTIFY_MANGA_EVENT}: {} chapter {}",
            notification.manga_id, notification.chapter
        );
    }

    fn sync_progress(&self, broadcast: &ProgressBroadcast) {
        info!(
            "{SYNC_PROGRESS_EVENT}: {} -> chapter {} (devices: {})",
            broadcast.manga_id, broadcast.current_chapter, broadcast.devices_synced
        );
    }

    fn chat_message(&self, message: &ChatMessage) {
        info!(
            "{CHAT_MESSAGE_EVENT}: [{}] {}: {}",
            message.room, message.username, message.message
        );
    }

    fn chat_connected(&self, room: &str) {
        info!("{CHAT_CONNECTED_EVENT}: {room}");
    }

    fn chat_disconnected(&self) {
        info!("{CHAT_DISCONNECTED_EVENT}");
    }
}
