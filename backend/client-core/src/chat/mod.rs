//! Real-time chat over WebSocket.
//!
//! One authenticated connection per room; switching rooms tears the old
//! connection down, waits a fixed grace period so the old read loop is
//! really gone, then dials again. Inbound frames go through a two-stage
//! decode: outer JSON (with a plain-text fallback that never drops a
//! payload), then at most one inner decode when the message text itself
//! carries a JSON object.

use crate::credentials::TokenProvider;
use crate::error::chat::ChatError;
use crate::events::EventSink;
use crate::CHAT_UPGRADE_PATH;

use common::{ChatMessage, ConnectionState, ErrorLocation};

use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Pause between tearing down an old connection and dialing the next one,
/// bounding the race between old-loop exit and new-loop start.
const RECONNECT_GRACE: Duration = Duration::from_millis(300);

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Default)]
struct ChatInner {
    write: Option<Arc<Mutex<WsWrite>>>,
    room: Option<String>,
    ws_base_url: Option<String>,
    read_task: Option<JoinHandle<()>>,
    is_connecting: bool,
    state: ConnectionState,
    /// Bumped on every connect/disconnect; a read loop only reports state for
    /// its own generation, so a stale loop cannot clobber a newer connection.
    generation: u64,
}

/// Client for the chat WebSocket endpoint.
pub struct ChatClient {
    token_provider: Arc<dyn TokenProvider>,
    sink: Arc<dyn EventSink>,
    inner: Arc<Mutex<ChatInner>>,
}

impl ChatClient {
    pub fn new(token_provider: Arc<dyn TokenProvider>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            token_provider,
            sink,
            inner: Arc::new(Mutex::new(ChatInner::default())),
        }
    }

    /// The room of the live connection, if any.
    pub async fn current_room(&self) -> Option<String> {
        self.inner.lock().await.room.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.write.is_some()
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    /// Connect to a chat room, replacing any previous connection.
    ///
    /// Exactly one connect may be in flight at a time; a concurrent call
    /// returns [`ChatError::AlreadyInProgress`] and opens no socket. Any
    /// prior read loop is cancelled first, then the method waits the fixed
    /// grace period before dialing, so two loops never emit to the sink
    /// concurrently.
    ///
    /// # Errors
    ///
    /// * [`ChatError::AlreadyInProgress`] - another connect is in flight
    /// * [`ChatError::Unauthenticated`] - no cached token for the upgrade
    /// * [`ChatError::Connection`] - bad base URL or dial/upgrade failure
    pub async fn connect(&self, ws_base_url: &str, room: &str) -> Result<(), ChatError> {
        let (old_task, old_write) = {
            let mut inner = self.inner.lock().await;
            if inner.is_connecting {
                warn!("Chat connection already in progress, ignoring");
                return Err(ChatError::AlreadyInProgress {
                    message: String::from("connection already in progress"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            inner.is_connecting = true;
            inner.state = ConnectionState::Connecting;
            (inner.read_task.take(), inner.write.take())
        };

        if let Some(task) = old_task {
            debug!("Cancelling existing read loop");
            task.abort();
        }
        drop(old_write);

        // Give the old read loop time to fully exit
        sleep(RECONNECT_GRACE).await;

        match self.dial(ws_base_url, room).await {
            Ok(()) => Ok(()),
            Err(error) => {
                let mut inner = self.inner.lock().await;
                inner.is_connecting = false;
                inner.state = ConnectionState::Disconnected;
                Err(error)
            }
        }
    }

    async fn dial(&self, ws_base_url: &str, room: &str) -> Result<(), ChatError> {
        Url::parse(ws_base_url).map_err(|e| ChatError::Connection {
            message: format!("invalid chat base URL {ws_base_url}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let Some(token) = self.token_provider.bearer_token() else {
            return Err(ChatError::Unauthenticated {
                message: String::from("unauthorized, please sign up or log in"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let url = format!(
            "{}{CHAT_UPGRADE_PATH}?room={room}",
            ws_base_url.trim_end_matches('/')
        );
        info!("Connecting to chat room at {url}");

        let mut request = url
            .clone()
            .into_client_request()
            .map_err(|e| ChatError::Connection {
                message: format!("invalid upgrade request for {url}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let bearer = format!("Bearer {}", token.as_str());
        let header = HeaderValue::from_str(&bearer).map_err(|e| ChatError::Connection {
            message: format!("invalid authorization header: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| ChatError::Connection {
                message: format!("chat dial failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let (write, read) = stream.split();

        let generation = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.write = Some(Arc::new(Mutex::new(write)));
            inner.room = Some(room.to_string());
            inner.ws_base_url = Some(ws_base_url.to_string());
            inner.is_connecting = false;
            inner.state = ConnectionState::Connected;
            inner.generation
        };

        let task = tokio::spawn(read_loop(
            read,
            generation,
            Arc::clone(&self.inner),
            Arc::clone(&self.sink),
        ));
        {
            let mut inner = self.inner.lock().await;
            if inner.generation == generation {
                inner.read_task = Some(task);
            } else {
                task.abort();
            }
        }

        info!("Connection established, read loop started");
        self.sink.chat_connected(room);
        Ok(())
    }

    /// Reconnect to a different room on the last-used base URL.
    ///
    /// # Errors
    ///
    /// [`ChatError::NotConnected`] when no connection was ever established;
    /// otherwise everything [`connect`](Self::connect) can return.
    pub async fn switch_room(&self, room: &str) -> Result<(), ChatError> {
        let base = self.inner.lock().await.ws_base_url.clone();

        let Some(base) = base else {
            return Err(ChatError::NotConnected {
                message: String::from("no previous connection established"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        self.connect(&base, room).await
    }

    /// Send one raw text frame.
    ///
    /// Asymmetric with receive on purpose: the server accepts bare text and
    /// wraps it itself, so there is no JSON envelope on send.
    ///
    /// # Errors
    ///
    /// * [`ChatError::NotConnected`] - no live connection
    /// * [`ChatError::Send`] - the write failed
    pub async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        let write = {
            let inner = self.inner.lock().await;
            inner.write.clone()
        };

        let Some(write) = write else {
            return Err(ChatError::NotConnected {
                message: String::from("not connected to any room"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        // only the write half's own lock is held across the socket send
        write
            .lock()
            .await
            .send(Message::text(text))
            .await
            .map_err(|e| ChatError::Send {
                message: format!("failed to send chat message: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Cancel the read loop, close the connection and clear the room.
    /// Idempotent.
    pub async fn disconnect(&self) {
        info!("Disconnecting chat client");

        let (task, write) = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.room = None;
            inner.is_connecting = false;
            inner.state = ConnectionState::Disconnected;
            (inner.read_task.take(), inner.write.take())
        };

        if let Some(task) = task {
            task.abort();
        }
        drop(write);
    }
}

async fn read_loop(
    mut read: WsRead,
    generation: u64,
    inner: Arc<Mutex<ChatInner>>,
    sink: Arc<dyn EventSink>,
) {
    loop {
        // blocking read per frame - liveness on this transport comes from the
        // peer closing the socket, not from a deadline
        let frame = match read.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                error!("Chat read error: {e}");
                break;
            }
            None => {
                info!("Chat stream ended");
                break;
            }
        };

        let raw = match frame {
            Message::Text(text) => text.as_str().to_string(),
            Message::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
            Message::Close(_) => {
                info!("Chat server closed the connection");
                break;
            }
            _ => continue,
        };

        let message = decode_frame(&raw);
        debug!(
            "Received message: type={}, user={}, msg={}",
            message.kind, message.username, message.message
        );
        sink.chat_message(&message);
    }

    // only the loop of the current connection reports the disconnect
    let mut guard = inner.lock().await;
    if guard.generation == generation {
        guard.state = ConnectionState::Disconnected;
        guard.write = None;
        guard.read_task = None;
        drop(guard);
        sink.chat_disconnected();
    }
    debug!("Chat read loop exited");
}

/// Decode one inbound frame into a [`ChatMessage`].
///
/// Stage one: outer JSON decode, falling back to a synthesized chat message
/// carrying the raw text - malformed payloads are never dropped. Stage two:
/// one conditional nested unwrap.
pub(crate) fn decode_frame(raw: &str) -> ChatMessage {
    let outer = match serde_json::from_str::<ChatMessage>(raw) {
        Ok(message) => message,
        Err(_) => {
            debug!("Plain text chat payload: {raw}");
            ChatMessage {
                kind: String::from("chat"),
                message: raw.to_string(),
                timestamp: unix_now(),
                ..ChatMessage::default()
            }
        }
    };

    unwrap_nested(outer)
}

/// If the message text itself is a JSON object or array, attempt exactly one
/// inner decode and let its present fields override the outer ones. Single
/// level only - the result is never fed back through.
pub(crate) fn unwrap_nested(mut message: ChatMessage) -> ChatMessage {
    if !(message.message.starts_with('{') || message.message.starts_with('[')) {
        return message;
    }

    if let Ok(nested) = serde_json::from_str::<ChatMessage>(&message.message) {
        if !nested.message.is_empty() {
            message.message = nested.message;
        }
        if !nested.kind.is_empty() {
            message.kind = nested.kind;
        }
        if !nested.username.is_empty() {
            message.username = nested.username;
        }
        if nested.timestamp > 0 {
            message.timestamp = nested.timestamp;
        }
    }

    message
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
