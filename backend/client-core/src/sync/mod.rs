//! Multi-device progress sync over a persistent TCP session.
//!
//! One handshake line out, then a stream of newline-delimited JSON
//! broadcasts in. The read loop applies a rolling deadline that is treated
//! as a keep-alive timeout, not a failure: a quiet connection stays up until
//! the peer actually closes it or the stream stops decoding.
//!
//! # Port Override
//!
//! The sync port is fixed in production. Tests and development setups can
//! retarget it with [`set_override_port`], and shrink the read deadline with
//! [`set_override_read_deadline`].

use crate::credentials::TokenProvider;
use crate::error::sync::SyncError;
use crate::events::EventSink;
use crate::SYNC_PORT;

use common::{ConnectionState, ErrorLocation, ProgressBroadcast};

use std::panic::Location;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use log::{debug, error, info, trace};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use uuid::Uuid;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_DEADLINE: Duration = Duration::from_secs(60);

static OVERRIDE_PORT: StdMutex<Option<u16>> = StdMutex::new(None);
static OVERRIDE_READ_DEADLINE: StdMutex<Option<Duration>> = StdMutex::new(None);

/// Retarget the sync connection to a specific port instead of the fixed one.
pub fn set_override_port(port: u16) {
    if let Ok(mut p) = OVERRIDE_PORT.lock() {
        *p = Some(port);
    }
}

/// Remove a previously set port override.
pub fn clear_override_port() {
    if let Ok(mut p) = OVERRIDE_PORT.lock() {
        *p = None;
    }
}

/// Get the current port override, if set.
pub fn get_override_port() -> Option<u16> {
    OVERRIDE_PORT.lock().ok().and_then(|p| *p)
}

/// Shrink the rolling read deadline (tests only - the production value is
/// sized for server keep-alive cadence).
pub fn set_override_read_deadline(deadline: Duration) {
    if let Ok(mut d) = OVERRIDE_READ_DEADLINE.lock() {
        *d = Some(deadline);
    }
}

/// Remove a previously set read-deadline override.
pub fn clear_override_read_deadline() {
    if let Ok(mut d) = OVERRIDE_READ_DEADLINE.lock() {
        *d = None;
    }
}

fn read_deadline() -> Duration {
    OVERRIDE_READ_DEADLINE
        .lock()
        .ok()
        .and_then(|d| *d)
        .unwrap_or(READ_DEADLINE)
}

#[derive(Serialize)]
struct Handshake<'a> {
    token: &'a str,
    device_id: &'a str,
}

#[derive(Default)]
struct SyncInner {
    running: bool,
    state: ConnectionState,
    read_task: Option<JoinHandle<()>>,
}

/// Client for the TCP progress-sync stream.
///
/// The device id is generated once per instance and stays stable for its
/// lifetime, so reconnects within one app run identify as the same device.
pub struct SyncClient {
    device_id: String,
    token_provider: Arc<dyn TokenProvider>,
    sink: Arc<dyn EventSink>,
    inner: Arc<Mutex<SyncInner>>,
}

impl SyncClient {
    pub fn new(token_provider: Arc<dyn TokenProvider>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            device_id: format!("device-{}", Uuid::new_v4()),
            token_provider,
            sink,
            inner: Arc::new(Mutex::new(SyncInner::default())),
        }
    }

    /// The stable per-instance device identifier sent in the handshake.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    /// Connect to the sync server and start the background read loop.
    ///
    /// A no-op when already running - the mutex-guarded `running` flag makes
    /// a second call return Ok without opening a second connection.
    ///
    /// # Errors
    ///
    /// * [`SyncError::Unauthenticated`] - no cached token
    /// * [`SyncError::Connection`] - dial failed or timed out (10 s)
    /// * [`SyncError::Handshake`] - handshake write failed; the socket is
    ///   closed and no retry is attempted
    pub async fn start_auto_connect(&self, host: &str) -> Result<(), SyncError> {
        let token = {
            let mut inner = self.inner.lock().await;
            if inner.running {
                debug!("Sync client already running");
                return Ok(());
            }

            let Some(token) = self.token_provider.bearer_token() else {
                return Err(SyncError::Unauthenticated {
                    message: String::from("not authenticated"),
                    location: ErrorLocation::from(Location::caller()),
                });
            };

            inner.running = true;
            inner.state = ConnectionState::Connecting;
            token
        };
        // lock released - the dial below must not serialize against stop()

        let port = get_override_port().unwrap_or(SYNC_PORT);
        let address = format!("{host}:{port}");

        let mut stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(address.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.reset_disconnected().await;
                return Err(SyncError::Connection {
                    message: format!("failed to connect to sync server {address}: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Err(_) => {
                self.reset_disconnected().await;
                return Err(SyncError::Connection {
                    message: format!(
                        "connect to {address} timed out after {}",
                        humantime::format_duration(CONNECT_TIMEOUT)
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let handshake = Handshake {
            token: token.as_str(),
            device_id: &self.device_id,
        };
        let mut line = match serde_json::to_vec(&handshake) {
            Ok(line) => line,
            Err(e) => {
                self.reset_disconnected().await;
                return Err(SyncError::Handshake {
                    message: format!("failed to encode handshake: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };
        line.push(b'\n');

        if let Err(e) = stream.write_all(&line).await {
            self.reset_disconnected().await;
            return Err(SyncError::Handshake {
                message: format!("handshake to {address} failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        info!(
            "TCP sync connected to {address} with device ID: {}",
            self.device_id
        );

        let task = tokio::spawn(read_loop(
            stream,
            Arc::clone(&self.inner),
            Arc::clone(&self.sink),
        ));

        let mut inner = self.inner.lock().await;
        if inner.running {
            inner.read_task = Some(task);
            inner.state = ConnectionState::Connected;
        } else {
            // stop() won the race while we were dialing
            task.abort();
        }
        Ok(())
    }

    /// Cancel the read loop and close the socket. Idempotent.
    ///
    /// Cancellation is eventual: an aborted loop dies at its next await
    /// point, which may be up to one read-deadline cycle away.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.read_task.take() {
            task.abort();
        }
        if inner.running {
            info!("TCP sync disconnected");
        }
        inner.running = false;
        inner.state = ConnectionState::Disconnected;
    }

    async fn reset_disconnected(&self) {
        let mut inner = self.inner.lock().await;
        inner.running = false;
        inner.state = ConnectionState::Disconnected;
    }
}

/// Decode one broadcast per stream message until the connection dies.
///
/// Deadline expiries keep any partially buffered line and continue; only a
/// decode failure, read error or EOF ends the loop.
async fn read_loop(stream: TcpStream, inner: Arc<Mutex<SyncInner>>, sink: Arc<dyn EventSink>) {
    let mut reader = BufReader::new(stream);
    let mut line: Vec<u8> = Vec::new();
    let deadline = read_deadline();

    loop {
        let read = loop {
            match timeout(deadline, reader.read_until(b'\n', &mut line)).await {
                Ok(result) => break result,
                Err(_) => {
                    trace!("sync read deadline elapsed, connection idle");
                }
            }
        };

        match read {
            Ok(0) => {
                info!("Sync server closed the connection");
                break;
            }
            Ok(_) => {
                let text = String::from_utf8_lossy(&line).trim().to_string();
                line.clear();
                if text.is_empty() {
                    continue;
                }

                match serde_json::from_str::<ProgressBroadcast>(&text) {
                    Ok(broadcast) => {
                        debug!(
                            "Sync update: {} -> chapter {} (devices: {})",
                            broadcast.manga_id, broadcast.current_chapter, broadcast.devices_synced
                        );
                        sink.sync_progress(&broadcast);
                    }
                    Err(e) => {
                        error!("Sync stream decode failed: {e}");
                        break;
                    }
                }
            }
            Err(e) => {
                error!("TCP connection error: {e}");
                break;
            }
        }
    }

    let mut guard = inner.lock().await;
    guard.running = false;
    guard.state = ConnectionState::Disconnected;
    guard.read_task = None;
    info!("TCP sync listener stopped");
}
