//! Server discovery over UDP broadcast.
//!
//! One broadcast datagram out, one offer in. The caller owns retries and
//! backoff; this module deliberately makes a single attempt per call.
//!
//! # Broadcast Override
//!
//! By default the request goes to the LAN broadcast address on the fixed
//! discovery port. Tests and development setups can redirect it to a specific
//! socket using [`set_override_broadcast_addr`].

use crate::error::discovery::DiscoveryError;
use crate::protocol::{ControlRequest, DiscoveryOffer, DISCOVER_OFFER_TYPE};
use crate::DISCOVERY_BROADCAST_ADDR;

use common::{ErrorLocation, ServerEndpoint, ServerEndpointBuilder};

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Mutex;
use std::time::Duration;

use log::debug;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const MAX_OFFER_BYTES: usize = 2048;

static OVERRIDE_BROADCAST_ADDR: Mutex<Option<SocketAddr>> = Mutex::new(None);

/// Redirect discovery broadcasts to a specific address.
///
/// When set, the discovery request is sent to this address instead of the
/// LAN broadcast address. Used by tests and single-host development setups.
pub fn set_override_broadcast_addr(addr: SocketAddr) {
    if let Ok(mut a) = OVERRIDE_BROADCAST_ADDR.lock() {
        *a = Some(addr);
    }
}

/// Remove a previously set broadcast override.
pub fn clear_override_broadcast_addr() {
    if let Ok(mut a) = OVERRIDE_BROADCAST_ADDR.lock() {
        *a = None;
    }
}

/// Get the current broadcast override, if set.
pub fn get_override_broadcast_addr() -> Option<SocketAddr> {
    OVERRIDE_BROADCAST_ADDR.lock().ok().and_then(|a| *a)
}

/// Discover a MangaHub backend on the local network.
///
/// Sends one `DISCOVER_MANGAHUB` broadcast from an ephemeral socket, then
/// waits for exactly one reply. First valid offer wins.
///
/// # Errors
///
/// * [`DiscoveryError::Timeout`] - no reply within `wait`
/// * [`DiscoveryError::Protocol`] - reply is not a valid `MANGAHUB_OFFER`
/// * [`DiscoveryError::Io`] - socket setup or send failed
pub async fn discover(wait: Duration) -> Result<ServerEndpoint, DiscoveryError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;

    let request =
        serde_json::to_vec(&ControlRequest::discover()).map_err(|e| DiscoveryError::Protocol {
            message: format!("failed to encode discovery request: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    match get_override_broadcast_addr() {
        Some(addr) => socket.send_to(&request, addr).await?,
        None => socket.send_to(&request, DISCOVERY_BROADCAST_ADDR).await?,
    };
    debug!("Sent UDP discovery broadcast");

    let mut buffer = [0u8; MAX_OFFER_BYTES];
    let (received, peer) = timeout(wait, socket.recv_from(&mut buffer))
        .await
        .map_err(|_| DiscoveryError::Timeout {
            message: format!("no server discovered within {}", humantime::format_duration(wait)),
            location: ErrorLocation::from(Location::caller()),
        })??;

    let offer: DiscoveryOffer =
        serde_json::from_slice(&buffer[..received]).map_err(|e| DiscoveryError::Protocol {
            message: format!("malformed discovery reply from {peer}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if offer.kind != DISCOVER_OFFER_TYPE {
        return Err(DiscoveryError::Protocol {
            message: format!("invalid discovery response from {peer}: type {:?}", offer.kind),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let endpoint = ServerEndpointBuilder::default()
        .with_host(offer.host)
        .with_port(offer.port)
        .build()
        .map_err(|e| DiscoveryError::Protocol {
            message: format!("unusable discovery offer from {peer}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    debug!("Discovered server: {} ({endpoint})", offer.name);
    Ok(endpoint)
}
