//! Error types for quill-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using quill-core's `ApiError`
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced by the API client and the services built on it.
///
/// The type is `Clone` so a single refresh failure can be delivered to every
/// request waiting on the same refresh cycle.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response was received
    #[error("Network request failed: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The server answered with a non-success status
    #[error("API error: {message} ({status})")]
    Http {
        status: u16,
        message: String,
        payload: Option<serde_json::Value>,
    },

    /// The refresh cycle failed; the session is gone
    #[error("Session refresh failed: {0}")]
    RefreshFailed(Box<ApiError>),

    /// No refresh token is stored
    #[error("No refresh token is stored")]
    MissingRefreshToken,

    /// Too many requests are already waiting on the refresh cycle
    #[error("Refresh queue is full ({0} pending requests)")]
    QueueFull(usize),

    /// The refresh cycle ended without settling this request
    #[error("Refresh cycle ended before the request was replayed")]
    RefreshAborted,

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Secure storage error
    #[error("Secure storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ApiError {
    /// HTTP status of the failure, when the server answered.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the request's credentials.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401, .. })
    }

    /// Whether this failure ended the session.
    pub const fn is_session_lost(&self) -> bool {
        matches!(self, Self::RefreshFailed(_) | Self::MissingRefreshToken)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            Self::InvalidRequest(error.to_string())
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}
