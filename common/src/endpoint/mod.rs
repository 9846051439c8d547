//! The server endpoint discovered on the local network.

pub mod builder;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Address of a discovered MangaHub backend.
///
/// Discovered once per session via UDP broadcast; every dependent transport
/// (notification registration, TCP sync, chat) must use the same instance
/// until an explicit rediscovery replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    /// The `host:port` form used for UDP unicast sends.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Display for ServerEndpoint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}
