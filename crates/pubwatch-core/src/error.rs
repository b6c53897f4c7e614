//! Error types for the pubwatch pipeline
//!
//! Collaborators (monitors, storage backends, notifiers) use these errors
//! internally and convert them into outcome values at their trait boundary.
//! Only the orchestrator's top-level run propagates them to the caller.

use thiserror::Error;

/// Result type alias for pubwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the pubwatch pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Monitor-related errors (discovery or download)
    #[error("Monitor error: {0}")]
    Monitor(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Notifier errors
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem and socket errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Remote resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a monitor error
    pub fn monitor(msg: impl Into<String>) -> Self {
        Self::Monitor(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a notifier error
    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::Notifier(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status from a provider API to an error
    ///
    /// 401/403 become [`Error::Authentication`], 404 [`Error::NotFound`],
    /// 429 [`Error::RateLimited`]; everything else is a provider error
    /// carrying the response body.
    pub fn from_status(provider: &str, status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::auth(format!(
                "{} rejected the credentials (status {})",
                provider, status
            )),
            404 => Self::not_found(format!("{} returned 404: {}", provider, body)),
            429 => Self::rate_limited(format!(
                "{} rate limit exceeded (status {})",
                provider, status
            )),
            500..=599 => Self::provider(
                provider,
                format!("server error (transient): {} - {}", status, body),
            ),
            _ => Self::provider(provider, format!("request failed: {} - {}", status, body)),
        }
    }

    /// Whether this error came from configuration rather than runtime work
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
