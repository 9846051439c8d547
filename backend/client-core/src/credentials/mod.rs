//! Credential access seam.
//!
//! Token persistence (format, storage, refresh) belongs to the hosting
//! application; the transport clients only ever need the current bearer
//! token, read-only, at the moment they establish a connection.

use common::RedactedToken;

/// Source of the current bearer token.
///
/// Called lazily at every connection attempt, so a login that happens after
/// the clients were constructed is picked up without re-wiring anything.
/// `None` means "not logged in yet".
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<RedactedToken>;
}

/// Provider wrapping a fixed token. Covers tests and hosts whose token
/// lives for the whole process.
pub struct StaticTokenProvider {
    token: Option<RedactedToken>,
}

impl StaticTokenProvider {
    pub fn new(token: RedactedToken) -> Self {
        Self { token: Some(token) }
    }

    /// A provider that always reports "not logged in".
    pub fn logged_out() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn bearer_token(&self) -> Option<RedactedToken> {
        self.token.clone()
    }
}
