//! Endpoint registry error types.

use thiserror::Error;

/// Errors raised by the endpoint registry and its persistence.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// A required field is blank. Nothing was written.
    #[error("endpoint {field} is required")]
    Validation { field: &'static str },

    /// Reading or writing the endpoint store failed.
    #[error("endpoint persistence error: {reason}")]
    Persistence { reason: String },

    /// No endpoint with this id is saved.
    #[error("endpoint not found: '{id}'")]
    NotFound { id: String },
}

impl From<std::io::Error> for EndpointError {
    fn from(e: std::io::Error) -> Self {
        EndpointError::Persistence {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for EndpointError {
    fn from(e: serde_json::Error) -> Self {
        EndpointError::Persistence {
            reason: e.to_string(),
        }
    }
}
