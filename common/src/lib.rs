//! Domain models for the MangaHub desktop client.
//!
//! This crate contains pure data structures representing the core
//! concepts in the application. Models have no business logic - they're
//! just data that can be passed between layers.
//!
//! ## Architecture
//!
//! - **common** (this crate): Pure data structures
//! - **client-core**: Transport clients and session coordination operating on
//!   these models
//!
//! This layered architecture keeps concerns separated and makes testing easier.

pub mod connection_state;
pub mod endpoint;
pub mod error;
pub mod messages;
pub mod redacted_token;

#[cfg(test)]
mod tests;

pub use connection_state::ConnectionState;
pub use endpoint::builder::ServerEndpointBuilder;
pub use endpoint::ServerEndpoint;
pub use error::error_location::ErrorLocation;
pub use error::model_error::ModelError;
pub use error::redact_error::RedactError;
pub use messages::{ChatMessage, Notification, ProgressBroadcast};
pub use redacted_token::RedactedToken;
