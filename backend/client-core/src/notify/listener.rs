//! Background UDP listener for inbound notification datagrams.
//!
//! The socket is bound exactly once per process lifetime and owned by the
//! loop task; the handler is injected at start so the loop never captures
//! mutable outer context. Malformed datagrams are dropped per-message and
//! never stop the loop.

use crate::error::notify::NotifyError;

use common::Notification;

use std::net::SocketAddr;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

const MAX_DATAGRAM_BYTES: usize = 2048;

/// Handle to a running notification listener.
///
/// Stopping the handle cancels the loop task, which closes the socket; a
/// datagram arriving afterwards triggers no handler call. Stop is eventual -
/// the loop observes cancellation at its next await point.
pub struct NotifyListenerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl NotifyListenerHandle {
    /// The address the listener actually bound (relevant when started on
    /// port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cancel the receive loop and close the socket. Idempotent.
    pub fn stop(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            info!("UDP listener on port {} stopped", self.local_addr.port());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for NotifyListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Bind the notification port and start the receive loop.
///
/// Every datagram that decodes into a [`Notification`] is passed to
/// `on_notification`; everything else is debug-logged and dropped.
///
/// # Errors
///
/// Returns [`NotifyError::Io`] if the port cannot be bound (most commonly:
/// a listener already exists in this process).
pub async fn start<F>(port: u16, on_notification: F) -> Result<NotifyListenerHandle, NotifyError>
where
    F: Fn(Notification) + Send + Sync + 'static,
{
    let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
    let local_addr = socket.local_addr()?;

    info!("UDP listener started on port {}", local_addr.port());

    let task = tokio::spawn(receive_loop(socket, on_notification));

    Ok(NotifyListenerHandle { local_addr, task })
}

async fn receive_loop<F>(socket: UdpSocket, on_notification: F)
where
    F: Fn(Notification) + Send + Sync + 'static,
{
    let mut buffer = [0u8; MAX_DATAGRAM_BYTES];

    loop {
        let (received, peer) = match socket.recv_from(&mut buffer).await {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("notification socket read failed: {e}");
                return;
            }
        };

        match serde_json::from_slice::<Notification>(&buffer[..received]) {
            Ok(notification) => {
                debug!(
                    "notification from {peer}: {} chapter {}",
                    notification.manga_id, notification.chapter
                );
                on_notification(notification);
            }
            Err(e) => {
                debug!("dropping malformed datagram from {peer}: {e}");
            }
        }
    }
}
