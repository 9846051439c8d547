//! Notification registration and subscription over UDP.
//!
//! Both operations are one-shot request/ack exchanges against the discovered
//! endpoint: unicast the control request, wait for the bounded ack, accept
//! only `status:"success"`. No internal retry - a failed ack is the caller's
//! decision to repeat.

pub mod listener;

use crate::error::notify::NotifyError;
use crate::protocol::{ControlReply, ControlRequest, CONTROL_STATUS_SUCCESS};

use common::{ErrorLocation, RedactedToken, ServerEndpoint};

use std::panic::Location;
use std::time::Duration;

use log::{debug, info};
use tokio::net::UdpSocket;
use tokio::time::timeout;

const REGISTER_REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const SUBSCRIBE_REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_REPLY_BYTES: usize = 1024;

/// Register this client for notification delivery.
///
/// The server starts pushing datagrams to the source address of this request
/// once it acks, which is why the session coordinator must see the ack
/// before it binds the listener port.
///
/// # Errors
///
/// * [`NotifyError::Timeout`] - no ack within 5 s
/// * [`NotifyError::Protocol`] - ack did not decode
/// * [`NotifyError::Rejected`] - ack status was not "success"
/// * [`NotifyError::Io`] - socket setup or send failed
pub async fn register(
    endpoint: &ServerEndpoint,
    token: &RedactedToken,
) -> Result<(), NotifyError> {
    send_control(
        endpoint,
        ControlRequest::register(token),
        REGISTER_REPLY_TIMEOUT,
        "register",
    )
    .await
}

/// Subscribe to release notifications for one manga.
///
/// Same exchange as [`register`] with `action:"subscribe"` and the manga id
/// as payload, on a tighter 2 s ack deadline.
pub async fn subscribe(
    endpoint: &ServerEndpoint,
    token: &RedactedToken,
    manga_id: &str,
) -> Result<(), NotifyError> {
    if manga_id.is_empty() {
        return Err(NotifyError::Rejected {
            payload: String::from("manga id required"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    send_control(
        endpoint,
        ControlRequest::subscribe(token, manga_id),
        SUBSCRIBE_REPLY_TIMEOUT,
        "subscribe",
    )
    .await
}

async fn send_control(
    endpoint: &ServerEndpoint,
    request: ControlRequest,
    reply_timeout: Duration,
    action: &str,
) -> Result<(), NotifyError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(endpoint.address()).await?;

    let body = serde_json::to_vec(&request).map_err(|e| NotifyError::Protocol {
        message: format!("failed to encode {action} request: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    socket.send(&body).await?;
    debug!("Sent UDP {action} request to {endpoint}");

    let mut buffer = [0u8; MAX_REPLY_BYTES];
    let received = timeout(reply_timeout, socket.recv(&mut buffer))
        .await
        .map_err(|_| NotifyError::Timeout {
            message: format!("no reply to {action} from {endpoint}"),
            location: ErrorLocation::from(Location::caller()),
        })??;

    let reply: ControlReply =
        serde_json::from_slice(&buffer[..received]).map_err(|e| NotifyError::Protocol {
            message: format!("malformed {action} reply from {endpoint}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if reply.status != CONTROL_STATUS_SUCCESS {
        return Err(NotifyError::Rejected {
            payload: reply.payload,
            location: ErrorLocation::from(Location::caller()),
        });
    }

    info!("UDP {action} acknowledged by {endpoint}");
    Ok(())
}
