use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ChatError {
    #[error("Chat Auth Error: {message} {location}")]
    Unauthenticated {
        message: String,
        location: ErrorLocation,
    },

    /// A connect was requested while another one is still in flight.
    #[error("Chat Busy Error: {message} {location}")]
    AlreadyInProgress {
        message: String,
        location: ErrorLocation,
    },

    #[error("Chat Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Chat Connection Error: {message} {location}")]
    Connection {
        message: String,
        location: ErrorLocation,
    },

    #[error("Chat Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },
}
