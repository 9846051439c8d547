//! Session lifecycle: discovery, registration, listener, sync auto-start.
//!
//! The coordinator owns the one sequence where ordering actually matters:
//! the register ack must land before the listener binds, otherwise the first
//! notification races the socket and is lost. Sync start happens in the
//! background after a short settle delay and its failure never fails the
//! session.

use crate::credentials::TokenProvider;
use crate::error::session::SessionError;
use crate::events::EventSink;
use crate::notify::listener::NotifyListenerHandle;
use crate::sync::SyncClient;
use crate::{cache, discovery, notify, NOTIFY_LISTEN_PORT};

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::time::sleep;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);
const SYNC_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Default)]
struct CoordinatorInner {
    running: bool,
    listener: Option<NotifyListenerHandle>,
}

/// Sequences the per-session bring-up and owns the notification listener.
pub struct SessionCoordinator {
    sync: Arc<SyncClient>,
    token_provider: Arc<dyn TokenProvider>,
    sink: Arc<dyn EventSink>,
    config_dir: PathBuf,
    listen_port: u16,
    inner: Arc<Mutex<CoordinatorInner>>,
}

impl SessionCoordinator {
    pub fn new(
        sync: Arc<SyncClient>,
        token_provider: Arc<dyn TokenProvider>,
        sink: Arc<dyn EventSink>,
        config_dir: PathBuf,
    ) -> Self {
        Self {
            sync,
            token_provider,
            sink,
            config_dir,
            listen_port: NOTIFY_LISTEN_PORT,
            inner: Arc::new(Mutex::new(CoordinatorInner::default())),
        }
    }

    /// Use a different local port for the notification listener.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running
    }

    /// Bring the session up: discover, register, listen, then sync.
    ///
    /// Idempotent under lock - a second call while running returns Ok
    /// without touching the network. With no cached token this is a
    /// successful no-op: the user simply has not logged in yet.
    ///
    /// # Errors
    ///
    /// Discovery and registration failures propagate; either one unwinds the
    /// running flag and any partially started listener.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.running {
                debug!("Session already started");
                return Ok(());
            }
            inner.running = true;
        }

        let Some(token) = self.token_provider.bearer_token() else {
            info!("No cached token, skipping session start");
            self.inner.lock().await.running = false;
            return Ok(());
        };

        match self.bring_up(&token).await {
            Ok(()) => Ok(()),
            Err(error) => {
                let mut inner = self.inner.lock().await;
                if let Some(listener) = inner.listener.take() {
                    listener.stop();
                }
                inner.running = false;
                Err(error)
            }
        }
    }

    async fn bring_up(&self, token: &RedactedToken) -> Result<(), SessionError> {
        let endpoint = discovery::discover(DISCOVERY_TIMEOUT).await?;

        if let Err(error) = cache::save_endpoint(&self.config_dir, &endpoint) {
            warn!("Failed to persist discovered endpoint: {error}");
        }

        // registration must fully ack before the listener exists - binding
        // the port speculatively would race the first notification
        notify::register(&endpoint, token).await?;

        let sink = Arc::clone(&self.sink);
        let listener = notify::listener::start(self.listen_port, move |notification| {
            sink.notification(&notification);
        })
        .await?;
        self.inner.lock().await.listener = Some(listener);

        let sync = Arc::clone(&self.sync);
        let config_dir = self.config_dir.clone();
        let discovered_host = endpoint.host.clone();
        tokio::spawn(async move {
            // let the listener settle before the sync stream comes up
            sleep(SYNC_SETTLE_DELAY).await;

            let host = cache::load_server_host(&config_dir).unwrap_or(discovered_host);
            if let Err(error) = sync.start_auto_connect(&host).await {
                error!("Failed to auto-start TCP sync: {error}");
            }
        });

        info!("Session started against {endpoint}");
        Ok(())
    }

    /// Subscribe to release notifications for one manga, using the cached
    /// endpoint.
    ///
    /// # Errors
    ///
    /// * [`SessionError::Unauthenticated`] - no cached token
    /// * [`SessionError::Cache`] - no endpoint cached yet
    /// * [`SessionError::Notify`] - the subscribe exchange failed
    pub async fn subscribe(&self, manga_id: &str) -> Result<(), SessionError> {
        let Some(token) = self.token_provider.bearer_token() else {
            return Err(SessionError::Unauthenticated {
                message: String::from("not authenticated"),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let endpoint = cache::load_endpoint(&self.config_dir)?;
        notify::subscribe(&endpoint, &token, manga_id).await?;
        Ok(())
    }

    /// Close the notification listener and clear the running state.
    /// Idempotent.
    ///
    /// The sync client is deliberately left running - its shutdown is an
    /// explicit step owned by the composing application.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(listener) = inner.listener.take() {
            listener.stop();
        }
        if inner.running {
            info!("Session stopped");
        }
        inner.running = false;
    }
}
