//! Outbound request construction.
//!
//! Combines the endpoint (target, auth, custom headers), the generation
//! parameters and the provider-mapped reasoning fields into a ready-to-send
//! request. Nothing here touches the network.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use super::classifier::{detect_provider, ReasoningProvider};
use super::errors::InferenceError;
use super::reasoning::{map_reasoning, ReasoningFields};
use super::types::{ChatCompletionRequest, GenerationRequest, ThinkingMode, ThinkingParam};
use crate::endpoints::Endpoint;

/// A fully composed chat-completion request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: ChatCompletionRequest,
    /// Provider detected from the request's model name.
    pub provider: Option<ReasoningProvider>,
    /// Reasoning fields the mapper emitted, for logging.
    pub mapped_fields: Vec<&'static str>,
}

/// `{url}/chat/completions`
pub fn chat_completions_url(endpoint: &Endpoint) -> String {
    format!("{}/chat/completions", endpoint.url.trim_end_matches('/'))
}

/// `{url}/models`
pub fn models_url(endpoint: &Endpoint) -> String {
    format!("{}/models", endpoint.url.trim_end_matches('/'))
}

/// Headers for every call to `endpoint`: JSON content type, bearer auth when
/// a key is configured, then the custom pairs in order. Duplicate custom
/// names are appended, not replaced.
pub fn build_headers(endpoint: &Endpoint) -> Result<HeaderMap, InferenceError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(key) = endpoint.api_key.as_deref().filter(|k| !k.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
            InferenceError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
                reason: e.to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in &endpoint.headers {
        if name.trim().is_empty() {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| {
            InferenceError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| InferenceError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}

/// Build the JSON body. `stream` overrides `request.stream` so the same
/// request can be sent either way.
pub fn build_request_body(request: &GenerationRequest, stream: bool) -> ChatCompletionRequest {
    let provider = detect_provider(&request.model);
    let mut body = ChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.clone(),
        temperature: request.effective_temperature(),
        stream,
        max_tokens: Some(request.effective_max_tokens()),
        max_completion_tokens: None,
        reasoning_effort: None,
        enable_thinking: None,
        thinking_budget: None,
        thinking: None,
    };

    if let Some(config) = &request.reasoning_config {
        let fields = map_reasoning(provider, config);
        apply_reasoning_fields(&mut body, provider, &fields);
    }

    body
}

/// Translate mapped fields into each provider's wire spelling.
fn apply_reasoning_fields(
    body: &mut ChatCompletionRequest,
    provider: Option<ReasoningProvider>,
    fields: &ReasoningFields,
) {
    let Some(provider) = provider else {
        return;
    };

    match provider {
        ReasoningProvider::OpenAI => {
            // Reasoning models reject `max_tokens` alongside `max_completion_tokens`.
            if let Some(limit) = fields.max_completion_tokens {
                body.max_tokens = None;
                body.max_completion_tokens = Some(limit);
            }
            body.reasoning_effort = fields.reasoning_effort;
        }
        ReasoningProvider::DeepSeek => {
            body.thinking = fields.enable_thinking.map(|on| ThinkingParam {
                r#type: thinking_mode(on),
                budget_tokens: None,
            });
        }
        ReasoningProvider::Qwen => {
            body.enable_thinking = fields.enable_thinking;
            body.thinking_budget = fields.thinking_budget_tokens;
        }
        ReasoningProvider::Claude => {
            body.thinking = fields.enable_thinking.map(|on| ThinkingParam {
                r#type: thinking_mode(on),
                budget_tokens: fields.thinking_budget_tokens,
            });
        }
    }
}

fn thinking_mode(enabled: bool) -> ThinkingMode {
    if enabled {
        ThinkingMode::Enabled
    } else {
        ThinkingMode::Disabled
    }
}

/// Compose URL, headers and body for a chat-completion call.
pub fn build_outbound(
    endpoint: &Endpoint,
    request: &GenerationRequest,
    stream: bool,
) -> Result<OutboundRequest, InferenceError> {
    let body = build_request_body(request, stream);
    let provider = detect_provider(&request.model);
    let mapped_fields = request
        .reasoning_config
        .as_ref()
        .map(|config| map_reasoning(provider, config).field_names())
        .unwrap_or_default();
    Ok(OutboundRequest {
        url: chat_completions_url(endpoint),
        headers: build_headers(endpoint)?,
        body,
        provider,
        mapped_fields,
    })
}
