//! JSON envelopes of the UDP control protocol.
//!
//! Discovery, registration and subscription all speak the same four-field
//! request shape; the server distinguishes them by `type` and `action`.

use common::RedactedToken;

use serde::{Deserialize, Serialize};

pub(crate) const DISCOVER_REQUEST_TYPE: &str = "DISCOVER_MANGAHUB";
pub(crate) const DISCOVER_OFFER_TYPE: &str = "MANGAHUB_OFFER";
pub(crate) const CONTROL_REQUEST_TYPE: &str = "MANGAHUB_REQUEST";
pub(crate) const CONTROL_STATUS_SUCCESS: &str = "success";

pub(crate) const REGISTER_ACTION: &str = "register";
pub(crate) const SUBSCRIBE_ACTION: &str = "subscribe";

/// One outbound control datagram. All four fields are always present on the
/// wire, empty where an operation has no use for them.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ControlRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action: &'static str,
    pub token: String,
    pub payload: String,
}

impl ControlRequest {
    pub fn discover() -> Self {
        Self {
            kind: DISCOVER_REQUEST_TYPE,
            action: "",
            token: String::new(),
            payload: String::new(),
        }
    }

    pub fn register(token: &RedactedToken) -> Self {
        Self {
            kind: CONTROL_REQUEST_TYPE,
            action: REGISTER_ACTION,
            token: token.as_str().to_string(),
            payload: String::new(),
        }
    }

    pub fn subscribe(token: &RedactedToken, manga_id: &str) -> Self {
        Self {
            kind: CONTROL_REQUEST_TYPE,
            action: SUBSCRIBE_ACTION,
            token: token.as_str().to_string(),
            payload: manga_id.to_string(),
        }
    }
}

/// Ack for register/subscribe requests.
#[derive(Debug, Deserialize)]
pub(crate) struct ControlReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payload: String,
}

/// Reply to a discovery broadcast.
#[derive(Debug, Deserialize)]
pub(crate) struct DiscoveryOffer {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}
