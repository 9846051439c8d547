pub mod cache;
pub mod chat;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod events;
pub mod logger;
pub mod notify;
pub mod session;
pub mod sync;

mod protocol;
#[cfg(test)]
mod tests;

/// UDP port the backend listens on for discovery broadcasts.
pub const DISCOVERY_PORT: u16 = 9091;

/// TCP port of the progress-sync stream.
pub const SYNC_PORT: u16 = 9090;

/// Local UDP port bound by the notification listener.
pub const NOTIFY_LISTEN_PORT: u16 = 3002;

/// Upgrade path of the chat WebSocket endpoint.
pub const CHAT_UPGRADE_PATH: &str = "/ws/chat";

pub const DISCOVERY_BROADCAST_ADDR: &str =
    const_format::concatcp!("255.255.255.255:", DISCOVERY_PORT);
