//! Non-streaming response parsing.
//!
//! Chat-completion bodies are parsed as untyped JSON because providers
//! disagree on shape: `message.content` is a string for OpenAI-compatible
//! servers but an array of typed blocks for Claude, and deliberation text
//! lives in different places per provider.

use serde_json::Value;

use super::classifier::ReasoningProvider;
use super::errors::InferenceError;
use super::types::{GenerationResponse, ThinkingBlock, UsageMetrics};

/// Parse a unary chat-completion body. `provider` decides where deliberation
/// text is looked for; it never leaks into `content`.
pub fn parse_completion_response(
    body: &str,
    provider: Option<ReasoningProvider>,
) -> Result<GenerationResponse, InferenceError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| InferenceError::ParseError {
        reason: format!("invalid JSON response: {e}"),
    })?;

    let choice = &parsed["choices"][0];
    let message = &choice["message"];

    let (content, thinking_blocks) = match &message["content"] {
        Value::String(text) => (text.clone(), Vec::new()),
        Value::Array(blocks) => split_content_blocks(blocks),
        _ => (String::new(), Vec::new()),
    };

    let reasoning_content = match provider {
        Some(ReasoningProvider::DeepSeek) | Some(ReasoningProvider::Qwen) => message["reasoning_content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    };

    let thinking_blocks = match provider {
        Some(ReasoningProvider::Claude) if !thinking_blocks.is_empty() => Some(thinking_blocks),
        _ => None,
    };

    Ok(GenerationResponse {
        content,
        usage: parse_usage(&parsed["usage"]),
        finish_reason: choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string(),
        reasoning_content,
        thinking_blocks,
        reasoning_provider: provider,
    })
}

/// Split a content-block array into answer text and thinking blocks,
/// preserving block order.
fn split_content_blocks(blocks: &[Value]) -> (String, Vec<ThinkingBlock>) {
    let mut text = String::new();
    let mut thinking = Vec::new();

    for block in blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text.push_str(t);
                }
            }
            Some("thinking") => thinking.push(ThinkingBlock {
                content: block["thinking"].as_str().unwrap_or_default().to_string(),
                summary: block["summary"].as_str().map(str::to_string),
            }),
            // redacted_thinking and unknown blocks carry nothing displayable
            _ => {}
        }
    }

    (text, thinking)
}

/// Usage is present only when all three core counts are.
fn parse_usage(usage: &Value) -> Option<UsageMetrics> {
    let count = |v: &Value| v.as_u64().map(|n| u32::try_from(n).unwrap_or(u32::MAX));

    let reasoning_tokens = count(&usage["reasoning_tokens"])
        .or_else(|| count(&usage["completion_tokens_details"]["reasoning_tokens"]));

    Some(UsageMetrics {
        prompt_tokens: count(&usage["prompt_tokens"])?,
        completion_tokens: count(&usage["completion_tokens"])?,
        total_tokens: count(&usage["total_tokens"])?,
        reasoning_tokens,
    })
}

/// Model ids from an OpenAI-style `{"data": [{"id": ...}]}` listing, in
/// server order. Entries without a string id are skipped.
pub fn parse_models_response(body: &str) -> Result<Vec<String>, InferenceError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| InferenceError::ParseError {
        reason: format!("invalid JSON response: {e}"),
    })?;

    let data = parsed["data"]
        .as_array()
        .ok_or_else(|| InferenceError::ParseError {
            reason: "invalid models response: 'data' field not found".to_string(),
        })?;

    Ok(data
        .iter()
        .filter_map(|model| model["id"].as_str().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_response() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12}
        });
        let resp = parse_completion_response(&body.to_string(), None).unwrap();
        assert_eq!(resp.content, "Hello");
        assert_eq!(resp.finish_reason, "length");
        assert_eq!(
            resp.usage,
            Some(UsageMetrics {
                prompt_tokens: 5,
                completion_tokens: 7,
                total_tokens: 12,
                reasoning_tokens: None,
            })
        );
        assert!(resp.reasoning_content.is_none());
        assert!(resp.thinking_blocks.is_none());
        assert!(resp.reasoning_provider.is_none());
    }

    #[test]
    fn test_missing_finish_reason_defaults_to_stop() {
        let body = json!({"choices": [{"message": {"content": "x"}}]});
        let resp = parse_completion_response(&body.to_string(), None).unwrap();
        assert_eq!(resp.finish_reason, "stop");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn test_incomplete_usage_is_dropped() {
        let body = json!({
            "choices": [{"message": {"content": "x"}}],
            "usage": {"prompt_tokens": 5}
        });
        let resp = parse_completion_response(&body.to_string(), None).unwrap();
        assert!(resp.usage.is_none());
    }

    #[test]
    fn test_deepseek_reasoning_content() {
        let body = json!({
            "choices": [{"message": {"content": "42", "reasoning_content": "Let me think"}}],
            "usage": {
                "prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3,
                "completion_tokens_details": {"reasoning_tokens": 9}
            }
        });
        let resp =
            parse_completion_response(&body.to_string(), Some(ReasoningProvider::DeepSeek))
                .unwrap();
        assert_eq!(resp.content, "42");
        assert_eq!(resp.reasoning_content.as_deref(), Some("Let me think"));
        assert_eq!(resp.usage.unwrap().reasoning_tokens, Some(9));
        assert_eq!(resp.reasoning_provider, Some(ReasoningProvider::DeepSeek));
    }

    #[test]
    fn test_reasoning_content_ignored_for_openai() {
        let body = json!({
            "choices": [{"message": {"content": "a", "reasoning_content": "hidden"}}],
            "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3, "reasoning_tokens": 64}
        });
        let resp =
            parse_completion_response(&body.to_string(), Some(ReasoningProvider::OpenAI))
                .unwrap();
        assert_eq!(resp.content, "a");
        assert!(resp.reasoning_content.is_none());
        assert_eq!(resp.usage.unwrap().reasoning_tokens, Some(64));
    }

    #[test]
    fn test_claude_thinking_blocks_in_order() {
        let body = json!({
            "choices": [{"message": {"content": [
                {"type": "thinking", "thinking": "first", "summary": "s1"},
                {"type": "text", "text": "The answer"},
                {"type": "thinking", "thinking": "second"},
                {"type": "text", "text": " is 4."}
            ]}, "finish_reason": "end_turn"}]
        });
        let resp =
            parse_completion_response(&body.to_string(), Some(ReasoningProvider::Claude))
                .unwrap();
        assert_eq!(resp.content, "The answer is 4.");
        let blocks = resp.thinking_blocks.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].content, "first");
        assert_eq!(blocks[0].summary.as_deref(), Some("s1"));
        assert_eq!(blocks[1].content, "second");
        assert!(blocks[1].summary.is_none());
    }

    #[test]
    fn test_thinking_blocks_only_for_claude() {
        let body = json!({
            "choices": [{"message": {"content": [
                {"type": "thinking", "thinking": "t"},
                {"type": "text", "text": "ok"}
            ]}}]
        });
        let resp = parse_completion_response(&body.to_string(), None).unwrap();
        assert_eq!(resp.content, "ok");
        assert!(resp.thinking_blocks.is_none());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse_completion_response("not json", None).unwrap_err();
        assert!(matches!(err, InferenceError::ParseError { .. }));
    }

    #[test]
    fn test_models_listing() {
        let body = json!({"data": [{"id": "gpt-4"}, {"object": "model"}, {"id": "o3-mini"}]});
        let models = parse_models_response(&body.to_string()).unwrap();
        assert_eq!(models, vec!["gpt-4", "o3-mini"]);
    }

    #[test]
    fn test_models_listing_without_data() {
        let err = parse_models_response(r#"{"models": []}"#).unwrap_err();
        assert!(matches!(err, InferenceError::ParseError { .. }));
    }
}
