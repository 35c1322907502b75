//! Inference: request composition and transport for chat-completion APIs.
//!
//! This module handles everything between a normalized generation request
//! and the wire:
//! - Model name → reasoning provider classification
//! - Normalized reasoning config → provider-specific body fields
//! - Header and body construction per endpoint
//! - Unary and SSE streaming transport, model listing, connection tests
//!
//! Everything speaks the OpenAI Chat Completions API; provider differences
//! are confined to the body fields and the response parsing.

pub mod classifier;
pub mod client;
pub mod errors;
pub mod reasoning;
pub mod request;
pub mod response;
pub mod streaming;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use classifier::{detect_provider, is_reasoning_model, ReasoningProvider};
pub use client::{HttpTransport, Timeouts};
pub use errors::InferenceError;
pub use reasoning::{map_reasoning, ReasoningConfig, ReasoningEffort, ReasoningFields};
pub use transport::{TokenEvent, Transport};
pub use types::{
    prompt_messages, GenerationRequest, GenerationResponse, Message, Role, ThinkingBlock,
    UsageMetrics,
};
