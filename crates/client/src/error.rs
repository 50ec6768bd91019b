//! Source transport error types.

use std::sync::Arc;

/// Errors from talking to a search source.
///
/// Strategies recover from every variant by returning no records; these only
/// surface in logs.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// A credentialed source was built without its key.
    #[error("missing API key: {0} not set")]
    MissingApiKey(&'static str),

    /// Authentication failed (invalid API key).
    #[error("authentication failed: invalid API key")]
    AuthError,

    /// Rate limited by the source.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Response body over the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { SourceError::Timeout } else { SourceError::Network(Arc::new(err)) }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}
