//! The seam between the generation controller and the network.
//!
//! Streaming results flow over a per-call channel owned by the caller, so a
//! second stream can never attach to, or detach, the first one's consumer.

use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::errors::InferenceError;
use super::types::{GenerationRequest, GenerationResponse};
use crate::endpoints::Endpoint;

/// One incremental event of a streaming call, stamped on arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// Answer text. May be whitespace only; never empty.
    Token { text: String, at: Instant },
    /// Deliberation text. Shown separately and not counted as a token.
    Reasoning { text: String, at: Instant },
}

impl TokenEvent {
    pub fn token(text: impl Into<String>) -> Self {
        TokenEvent::Token {
            text: text.into(),
            at: Instant::now(),
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        TokenEvent::Reasoning {
            text: text.into(),
            at: Instant::now(),
        }
    }
}

/// Network operations against an OpenAI-compatible endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Single request, single complete response.
    async fn unary_call(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, InferenceError>;

    /// Streamed request. Every non-empty content delta is sent to `events`
    /// in arrival order before the call returns the concatenated answer.
    /// Events already sent stay delivered when the call fails mid-stream.
    async fn streaming_call(
        &self,
        endpoint: &Endpoint,
        request: &GenerationRequest,
        events: UnboundedSender<TokenEvent>,
    ) -> Result<String, InferenceError>;

    /// Model ids advertised by `GET {url}/models`.
    async fn fetch_available_models(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Vec<String>, InferenceError>;

    /// Probe the endpoint. Returns a human-readable success message.
    async fn test_connection(&self, endpoint: &Endpoint) -> Result<String, InferenceError>;
}
