//! Error types for weathernews-core.
//!
//! # Fetch failures
//!
//! [`Error::Transport`], [`Error::Decode`], [`Error::Provider`] and
//! [`Error::EmptyResult`] all mean the same thing to the sync pipeline: the
//! refresh is abandoned, nothing is published and the cache keeps its
//! previous contents. The next attempt is the next recurring tick or an
//! explicit trigger. Use [`Error::is_fetch_failure`] to classify.
//!
//! Store, settings and presenter errors are logged where they occur and never
//! reach readers of the cache.

use thiserror::Error;

/// Errors raised by the sync pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// HTTP transport failure (connect, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider response could not be decoded.
    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    /// The provider answered with an error code.
    #[error("Provider returned error {code}: {message}")]
    Provider {
        /// Provider or HTTP status code.
        code: i64,
        /// Message supplied by the provider, if any.
        message: String,
    },

    /// The provider answered successfully but with no forecasts.
    #[error("Provider returned no forecasts")]
    EmptyResult,

    /// Local store failure.
    #[error("Store error: {0}")]
    Store(#[from] weathernews_store::Error),

    /// Settings could not be read or saved.
    #[error("Settings error: {0}")]
    Settings(String),

    /// The notification presenter failed.
    #[error("Presenter error: {0}")]
    Presenter(String),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a provider error.
    pub fn provider(code: i64, message: impl Into<String>) -> Self {
        Self::Provider {
            code,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error ends a fetch without publishing anything.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Decode(_) | Self::Provider { .. } | Self::EmptyResult
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias using weathernews-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
