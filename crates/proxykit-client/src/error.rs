//! Error types for the client library.

use serde::Deserialize;
use thiserror::Error;

/// Message used when the API rejects a call without explaining why.
pub(crate) const GENERIC_REJECTION: &str = "remote request failed";

/// Error body returned by the API.
///
/// Failures use the same envelope as successes, so only the message is read.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure description.
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors that can occur when talking to the credential API.
///
/// The kinds map onto how callers should react:
/// - [`ClientError::ValidationError`]: bad input, nothing was sent
/// - [`ClientError::RemoteRejection`]: the API answered and refused
/// - [`ClientError::NotFound`]: the API does not know the credential
/// - [`ClientError::NetworkError`] / [`ClientError::MiddlewareError`]: no answer
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Input rejected before any request was made.
    #[error("Invalid input: {0}")]
    ValidationError(String),

    /// The API completed the call but reported failure.
    ///
    /// `Display` yields the API's message verbatim.
    #[error("{message}")]
    RemoteRejection {
        /// HTTP status code, when the rejection came with one.
        status: Option<u16>,
        /// Message provided by the API, or a generic description.
        message: String,
    },

    /// The requested credential does not exist (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or HTTP request failure.
    ///
    /// Indicates issues like DNS resolution, connection failures, or timeouts.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Middleware layer error, including exhausted retries.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The API answered with a body that does not match the contract.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration issue.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ClientError {
    /// Build a rejection, falling back to a generic message when the API sent
    /// none.
    pub fn rejection(status: Option<u16>, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| match status {
                Some(code) => format!("{GENERIC_REJECTION} (HTTP {code})"),
                None => GENERIC_REJECTION.to_string(),
            });
        Self::RemoteRejection { status, message }
    }

    /// Check if this is a not-found error.
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::RemoteRejection {
                    status: Some(404),
                    ..
                }
        )
    }

    /// Check if the request never completed.
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::MiddlewareError(_))
    }

    /// Check if this is an authentication error (HTTP 401 or 403).
    pub const fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::RemoteRejection {
                status: Some(401 | 403),
                ..
            }
        )
    }

    /// Check if this error is potentially retryable.
    ///
    /// Returns `true` for transport failures, rate limits and server errors.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::MiddlewareError(_) => true,
            Self::RemoteRejection {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRejection { status, .. } => *status,
            Self::NotFound(_) => Some(404),
            Self::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result alias for client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
