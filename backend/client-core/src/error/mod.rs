pub mod cache;
pub mod chat;
pub mod discovery;
pub mod logger;
pub mod notify;
pub mod session;
pub mod sync;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Discovery(#[from] discovery::DiscoveryError),

    #[error(transparent)]
    Notify(#[from] notify::NotifyError),

    #[error(transparent)]
    Sync(#[from] sync::SyncError),

    #[error(transparent)]
    Chat(#[from] chat::ChatError),

    #[error(transparent)]
    Session(#[from] session::SessionError),

    #[error(transparent)]
    Cache(#[from] cache::CacheError),

    #[error(transparent)]
    Logger(#[from] logger::LoggerError),
}
