//! Transport error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. The `Display`
//! output is what the display layer shows to the user, so it carries the
//! provider's own message text unmodified.

use thiserror::Error;

/// Errors that can occur while talking to a chat-completion endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The endpoint did not respond within the configured timeout.
    #[error("request timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// The endpoint rejected the credentials (HTTP 401/403).
    #[error("authentication failed (HTTP {status}): {body}")]
    AuthError { status: u16, body: String },

    /// Any other non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("failed to parse response: {reason}")]
    ParseError { reason: String },

    /// SSE stream read or chunk-level error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// A custom header could not be encoded onto the request.
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl InferenceError {
    /// Classify a non-success status into `AuthError` or `HttpError`.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => InferenceError::AuthError { status, body },
            _ => InferenceError::HttpError { status, body },
        }
    }

    /// Map a `reqwest` send failure onto the taxonomy.
    pub fn from_send_error(endpoint: &str, err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout {
                duration_secs: timeout_secs,
            }
        } else {
            InferenceError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Whether this error was raised because the credentials were rejected.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, InferenceError::AuthError { .. })
    }

    /// Extract the response body text, if this error carries one.
    pub fn error_body(&self) -> Option<&str> {
        match self {
            InferenceError::HttpError { body, .. } | InferenceError::AuthError { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}
