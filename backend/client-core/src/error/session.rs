use crate::error::cache::CacheError;
use crate::error::discovery::DiscoveryError;
use crate::error::notify::NotifyError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Session Auth Error: {message} {location}")]
    Unauthenticated {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}
