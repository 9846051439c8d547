use serde::{Deserialize, Serialize};

/// Lifecycle state of one transport connection.
///
/// Each transport client holds exactly one of these at a time; there is never
/// more than one live network handle per transport per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}
