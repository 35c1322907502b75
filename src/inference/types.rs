//! Shared types for the inference pipeline.
//!
//! The first half is the normalized model handed between the display layer
//! and the pipeline (camelCase on the wire to the frontend). The second half
//! mirrors the OpenAI Chat Completions API, used for request building and
//! stream parsing.

use serde::{Deserialize, Serialize};

use super::classifier::ReasoningProvider;
use super::reasoning::{ReasoningConfig, ReasoningEffort};

// ─── Conversation ────────────────────────────────────────────────────────────

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the conversation sent with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Build the conversation for a single prompt: an optional system message
/// (skipped when blank) followed by the user prompt.
pub fn prompt_messages(system: Option<&str>, prompt: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));
    messages
}

// ─── Request / Response ──────────────────────────────────────────────────────

/// Lowest accepted sampling temperature.
pub const MIN_TEMPERATURE: f32 = 0.0;
/// Highest accepted sampling temperature.
pub const MAX_TEMPERATURE: f32 = 2.0;
/// Default completion budget when the caller does not pick one.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// One invocation's generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_config: Option<ReasoningConfig>,
}

impl GenerationRequest {
    /// New streaming request with temperature 0 and the default token budget.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: MIN_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
            reasoning_config: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_reasoning(mut self, config: ReasoningConfig) -> Self {
        self.reasoning_config = Some(config);
        self
    }

    /// Temperature clamped into `[0, 2]`. NaN falls back to 0.
    pub fn effective_temperature(&self) -> f32 {
        if self.temperature.is_nan() {
            return MIN_TEMPERATURE;
        }
        self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    }

    /// Token limit, never below 1.
    pub fn effective_max_tokens(&self) -> u32 {
        self.max_tokens.max(1)
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetrics {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

/// One independent block of extended thinking (Claude). Blocks are kept in
/// arrival order and never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Result of a unary call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub content: String,
    pub usage: Option<UsageMetrics>,
    pub finish_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_blocks: Option<Vec<ThinkingBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_provider: Option<ReasoningProvider>,
}

// ─── Wire: request body ──────────────────────────────────────────────────────

/// `thinking.type` for DeepSeek and Claude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Enabled,
    Disabled,
}

/// The nested `thinking` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThinkingParam {
    pub r#type: ThinkingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u32>,
}

/// Request body for `POST {url}/chat/completions`.
///
/// Every provider-specific field is optional and omitted when `None`, so a
/// provider never receives fields it does not understand.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingParam>,
}

// ─── Wire: stream chunks ─────────────────────────────────────────────────────

/// Raw SSE chunk from the Chat Completions API.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChunk {
    /// Usage-only trailer chunks arrive with an empty list.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A single choice within a streaming chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

/// The incremental update within a chunk choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    /// DeepSeek / Qwen deliberation channel.
    #[serde(default)]
    pub reasoning_content: Option<String>,
}
