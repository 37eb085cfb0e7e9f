//! Error types for roster-source.

use thiserror::Error;

/// Failures talking to the access-control API.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection refused, DNS, TLS handshake, timeout.
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// HTTP 429. Retried by [`crate::RetryPolicy`] where a retry is defined.
    #[error("rate limited by {url}")]
    RateLimited { url: String },

    /// The API answered but reported a non-success status.
    #[error("source returned {code}: {message}")]
    Application { code: String, message: String },

    /// HTTP 404, or a named object absent from a listing.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Body was not the JSON shape we expect.
    #[error("cannot decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}
