use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NotifyError {
    #[error("Notify Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Notify Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    /// The server answered with a status other than "success".
    #[error("Notify Rejected Error: {payload} {location}")]
    Rejected {
        payload: String,
        location: ErrorLocation,
    },

    #[error("Notify IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl From<IoError> for NotifyError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        NotifyError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
