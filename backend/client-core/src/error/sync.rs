use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SyncError {
    #[error("Sync Auth Error: {message} {location}")]
    Unauthenticated {
        message: String,
        location: ErrorLocation,
    },

    #[error("Sync Connection Error: {message} {location}")]
    Connection {
        message: String,
        location: ErrorLocation,
    },

    #[error("Sync Handshake Error: {message} {location}")]
    Handshake {
        message: String,
        location: ErrorLocation,
    },
}
