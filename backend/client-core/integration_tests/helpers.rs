// Shared test harnesses: a channel-backed event sink and in-process mock
// servers for each transport (UDP control, TCP sync, WebSocket chat).

use client_core::credentials::StaticTokenProvider;
use client_core::events::EventSink;

use common::{ChatMessage, Notification, ProgressBroadcast, RedactedToken};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
pub enum SinkEvent {
    Notification(Notification),
    SyncProgress(ProgressBroadcast),
    ChatMessage(ChatMessage),
    ChatConnected(String),
    ChatDisconnected,
}

/// Event sink forwarding everything into an unbounded channel the test can
/// drain with [`recv_within`].
pub struct ChannelSink {
    tx: UnboundedSender<SinkEvent>,
}

impl EventSink for ChannelSink {
    fn notification(&self, notification: &Notification) {
        let _ = self.tx.send(SinkEvent::Notification(notification.clone()));
    }

    fn sync_progress(&self, broadcast: &ProgressBroadcast) {
        let _ = self.tx.send(SinkEvent::SyncProgress(broadcast.clone()));
    }

    fn chat_message(&self, message: &ChatMessage) {
        let _ = self.tx.send(SinkEvent::ChatMessage(message.clone()));
    }

    fn chat_connected(&self, room: &str) {
        let _ = self.tx.send(SinkEvent::ChatConnected(room.to_string()));
    }

    fn chat_disconnected(&self) {
        let _ = self.tx.send(SinkEvent::ChatDisconnected);
    }
}

pub fn channel_sink() -> (Arc<ChannelSink>, UnboundedReceiver<SinkEvent>) {
    let (tx, rx) = unbounded_channel();
    (Arc::new(ChannelSink { tx }), rx)
}

pub fn token_provider(token: &str) -> Arc<StaticTokenProvider> {
    Arc::new(StaticTokenProvider::new(RedactedToken::new(
        token.to_string(),
    )))
}

pub async fn recv_within<T>(rx: &mut UnboundedReceiver<T>, wait: Duration) -> Option<T> {
    tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
}

/// UDP server answering every inbound datagram with one canned JSON reply.
/// Received datagrams are forwarded as JSON values.
pub async fn spawn_udp_replier(
    reply: serde_json::Value,
) -> (SocketAddr, UnboundedReceiver<serde_json::Value>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = unbounded_channel();

    tokio::spawn(async move {
        let mut buffer = [0u8; 2048];
        loop {
            let Ok((received, peer)) = socket.recv_from(&mut buffer).await else {
                return;
            };
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&buffer[..received]) {
                let _ = tx.send(value);
            }
            let body = reply.to_string();
            let _ = socket.send_to(body.as_bytes(), peer).await;
        }
    });

    (addr, rx)
}

/// UDP socket that swallows everything and never replies.
pub async fn spawn_silent_udp() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buffer = [0u8; 2048];
        loop {
            if socket.recv_from(&mut buffer).await.is_err() {
                return;
            }
        }
    });

    addr
}

/// Combined discovery + control server on one UDP socket, the way the real
/// backend multiplexes its discovery port. Discovery broadcasts get an offer
/// pointing back at this socket; control requests get `register_reply`.
pub async fn spawn_control_server(
    register_reply: serde_json::Value,
) -> (SocketAddr, UnboundedReceiver<serde_json::Value>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = unbounded_channel();

    tokio::spawn(async move {
        let mut buffer = [0u8; 2048];
        loop {
            let Ok((received, peer)) = socket.recv_from(&mut buffer).await else {
                return;
            };
            let Ok(value) = serde_json::from_slice::<serde_json::Value>(&buffer[..received])
            else {
                continue;
            };

            let reply = if value["type"] == "DISCOVER_MANGAHUB" {
                serde_json::json!({
                    "type": "MANGAHUB_OFFER",
                    "name": "srv1",
                    "host": "127.0.0.1",
                    "port": addr.port(),
                })
            } else {
                register_reply.clone()
            };

            let _ = tx.send(value);
            let _ = socket.send_to(reply.to_string().as_bytes(), peer).await;
        }
    });

    (addr, rx)
}

pub struct SyncHarness {
    pub addr: SocketAddr,
    pub accepts: Arc<AtomicUsize>,
    pub handshakes: UnboundedReceiver<serde_json::Value>,
}

/// TCP sync server: accepts connections, records the handshake line, then
/// plays `script` (delay, JSON line) and holds the connection open.
pub async fn spawn_sync_server(script: Vec<(Duration, String)>) -> SyncHarness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded_channel();

    let accept_counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            accept_counter.fetch_add(1, Ordering::SeqCst);

            let tx = tx.clone();
            let script = script.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                if reader.read_line(&mut line).await.is_err() {
                    return;
                }
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) {
                    let _ = tx.send(value);
                }

                let mut stream = reader.into_inner();
                for (delay, payload) in script {
                    tokio::time::sleep(delay).await;
                    if stream.write_all(payload.as_bytes()).await.is_err() {
                        return;
                    }
                    if stream.write_all(b"\n").await.is_err() {
                        return;
                    }
                }

                // hold the connection open until the test tears the runtime down
                std::future::pending::<()>().await;
            });
        }
    });

    SyncHarness {
        addr,
        accepts,
        handshakes: rx,
    }
}

#[derive(Debug)]
pub struct UpgradeInfo {
    pub uri: String,
    pub authorization: Option<String>,
}

pub struct ChatHarness {
    pub base_url: String,
    pub accepts: Arc<AtomicUsize>,
    pub upgrades: UnboundedReceiver<UpgradeInfo>,
    pub inbound: UnboundedReceiver<String>,
}

/// WebSocket chat server: records each upgrade request's URI and
/// Authorization header, sends the canned frames, then either closes or
/// forwards inbound text frames.
pub async fn spawn_chat_server(canned: Vec<String>, close_after_send: bool) -> ChatHarness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let (upgrade_tx, upgrades) = unbounded_channel();
    let (inbound_tx, inbound) = unbounded_channel();

    let accept_counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            accept_counter.fetch_add(1, Ordering::SeqCst);

            let upgrade_tx = upgrade_tx.clone();
            let inbound_tx = inbound_tx.clone();
            let canned = canned.clone();
            tokio::spawn(async move {
                let callback = |request: &Request, response: Response| {
                    let authorization = request
                        .headers()
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(String::from);
                    let _ = upgrade_tx.send(UpgradeInfo {
                        uri: request.uri().to_string(),
                        authorization,
                    });
                    Ok::<Response, ErrorResponse>(response)
                };

                let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                    return;
                };

                for frame in canned {
                    if ws.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }

                if close_after_send {
                    let _ = ws.close(None).await;
                    return;
                }

                while let Some(Ok(message)) = ws.next().await {
                    if let Message::Text(text) = message {
                        let _ = inbound_tx.send(text.as_str().to_string());
                    }
                }
            });
        }
    });

    ChatHarness {
        base_url: format!("ws://127.0.0.1:{}", addr.port()),
        accepts,
        upgrades,
        inbound,
    }
}
