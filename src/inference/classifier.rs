//! Model name → reasoning provider classification.
//!
//! Provider naming overlaps (a deployment may be called `gpt-5-deepseek-bridge`),
//! so classification is an ordered list of pattern tests where the first match
//! wins:
//!
//! 1. OpenAI: starts with `o1` / `o3`, or contains `gpt-5` / `gpt_5`.
//! 2. DeepSeek: contains `deepseek` (optionally `-r1`, `v3`, `-reasoner`, ...).
//! 3. Qwen: the whole name is `qwen` or `qwq`, optionally followed by one
//!    separator and `plus` / `max` / `turbo` / `coder` or a numeric version.
//! 4. Claude: starts with `claude` followed by `3.7`, `4`, `opus-4.5` or `sonnet-4`.
//!
//! Anything else (including the empty string) is not reasoning-capable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A model family whose API exposes extended deliberation controls.
///
/// Always derived from the model name, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Qwen,
    Claude,
}

impl ReasoningProvider {
    /// Every variant, in classification priority order.
    pub const ALL: [ReasoningProvider; 4] = [
        ReasoningProvider::OpenAI,
        ReasoningProvider::DeepSeek,
        ReasoningProvider::Qwen,
        ReasoningProvider::Claude,
    ];

    /// Human-readable provider name.
    pub fn display_name(self) -> &'static str {
        match self {
            ReasoningProvider::OpenAI => "OpenAI",
            ReasoningProvider::DeepSeek => "DeepSeek",
            ReasoningProvider::Qwen => "Qwen",
            ReasoningProvider::Claude => "Claude",
        }
    }

    /// Stable lowercase identifier (matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningProvider::OpenAI => "openai",
            ReasoningProvider::DeepSeek => "deepseek",
            ReasoningProvider::Qwen => "qwen",
            ReasoningProvider::Claude => "claude",
        }
    }

    fn matches(self, normalized: &str) -> bool {
        match self {
            ReasoningProvider::OpenAI => {
                OPENAI_PREFIX.is_match(normalized) || GPT5.is_match(normalized)
            }
            ReasoningProvider::DeepSeek => DEEPSEEK.is_match(normalized),
            ReasoningProvider::Qwen => QWEN.is_match(normalized),
            ReasoningProvider::Claude => CLAUDE.is_match(normalized),
        }
    }
}

impl std::fmt::Display for ReasoningProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─── Patterns ────────────────────────────────────────────────────────────────

// The patterns are literals; compilation cannot fail.
static OPENAI_PREFIX: Lazy<Regex> = Lazy::new(|| compile(r"^o[13]"));
static GPT5: Lazy<Regex> = Lazy::new(|| compile(r"gpt[-_]5"));
static DEEPSEEK: Lazy<Regex> =
    Lazy::new(|| compile(r"deepseek(?:[-_]?[rv][13])?(?:\.?\d+)?(?:[-_]?reason(?:er)?)?"));
static QWEN: Lazy<Regex> =
    Lazy::new(|| compile(r"^(?:qwen|qwq)(?:[-_.]?(?:plus|max|turbo|coder|\d+(?:\.\d*)?))?$"));
static CLAUDE: Lazy<Regex> =
    Lazy::new(|| compile(r"^claude[-_]?(?:3\.7|4|opus[-_]4\.5|sonnet[-_]4)"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("classifier pattern is a valid regex literal")
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Classify a model identifier (case-insensitive). Pure and total.
/// Surrounding whitespace is part of the identifier and is not stripped.
pub fn detect_provider(model_name: &str) -> Option<ReasoningProvider> {
    let normalized = model_name.to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    ReasoningProvider::ALL
        .into_iter()
        .find(|provider| provider.matches(&normalized))
}

/// Whether the model exposes reasoning controls at all.
pub fn is_reasoning_model(model_name: &str) -> bool {
    detect_provider(model_name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    use super::ReasoningProvider::{Claude, DeepSeek, OpenAI, Qwen};

    const FIXTURES: &[(&str, Option<ReasoningProvider>)] = &[
        ("o1", Some(OpenAI)),
        ("o1-preview", Some(OpenAI)),
        ("o1-mini", Some(OpenAI)),
        ("o3", Some(OpenAI)),
        ("o3-mini", Some(OpenAI)),
        ("gpt-5", Some(OpenAI)),
        ("gpt-5.0", Some(OpenAI)),
        ("gpt_5_x", Some(OpenAI)),
        ("O1-PREVIEW", Some(OpenAI)),
        ("deepseek-r1", Some(DeepSeek)),
        ("deepseek-reasoner", Some(DeepSeek)),
        ("Deepseekv3.2", Some(DeepSeek)),
        ("deepseek-v3", Some(DeepSeek)),
        ("DEEPSEEK-R1", Some(DeepSeek)),
        ("deepseek-chat", Some(DeepSeek)),
        ("accounts/fireworks/models/deepseek-r1", Some(DeepSeek)),
        ("qwen", Some(Qwen)),
        ("qwq", Some(Qwen)),
        ("qwen-plus", Some(Qwen)),
        ("QWEN-TURBO", Some(Qwen)),
        ("qwen-max", Some(Qwen)),
        ("qwen_coder", Some(Qwen)),
        ("qwen2.5", Some(Qwen)),
        ("qwq-32", Some(Qwen)),
        ("qwen3", Some(Qwen)),
        ("claude-3.7-sonnet", Some(Claude)),
        ("claude-4-sonnet", Some(Claude)),
        ("claude-opus-4.5", Some(Claude)),
        ("claude-sonnet-4-20250514", Some(Claude)),
        ("CLAUDE-4-SONNET", Some(Claude)),
        ("gpt-4", None),
        ("gpt-4o", None),
        ("gpt-3.5-turbo", None),
        ("llama-2", None),
        ("mistral-7b", None),
        ("claude-3.5-sonnet", None),
        ("claude", None),
        ("", None),
        ("   ", None),
    ];

    #[test]
    fn test_fixture_table() {
        for (name, expected) in FIXTURES {
            assert_eq!(detect_provider(name), *expected, "model name {name:?}");
        }
    }

    #[test]
    fn test_qwen_is_whole_string_anchored() {
        assert_eq!(detect_provider("my-qwen-plus"), None);
        assert_eq!(detect_provider("qwen-plus-latest"), None);
        assert_eq!(detect_provider("qwen3-max"), None);
        assert_eq!(detect_provider("qwq-32b"), None);
    }

    #[test]
    fn test_surrounding_whitespace_is_not_stripped() {
        assert_eq!(detect_provider("qwen "), None);
        assert_eq!(detect_provider(" qwq"), None);
        assert_eq!(detect_provider(" o1"), None);
        assert_eq!(detect_provider("QWEN"), Some(Qwen));
    }

    #[test]
    fn test_openai_wins_over_deepseek() {
        assert_eq!(detect_provider("o1-deepseek-r1"), Some(OpenAI));
        assert_eq!(detect_provider("deepseek-gpt-5-distill"), Some(OpenAI));
    }

    #[test]
    fn test_deepseek_wins_over_claude() {
        assert_eq!(detect_provider("claude-4-deepseek"), Some(DeepSeek));
    }

    #[test]
    fn test_deterministic() {
        for _ in 0..3 {
            assert_eq!(detect_provider("deepseek-r1"), Some(DeepSeek));
        }
    }

    #[test]
    fn test_is_reasoning_model() {
        assert!(is_reasoning_model("o3-mini"));
        assert!(!is_reasoning_model("gpt-4"));
    }

    #[test]
    fn test_display_name_and_serde() {
        assert_eq!(OpenAI.display_name(), "OpenAI");
        assert_eq!(DeepSeek.to_string(), "DeepSeek");
        assert_eq!(serde_json::to_string(&OpenAI).unwrap(), "\"openai\"");
        assert_eq!(serde_json::to_string(&DeepSeek).unwrap(), "\"deepseek\"");
        assert_eq!(serde_json::to_string(&Qwen).unwrap(), "\"qwen\"");
        for provider in ReasoningProvider::ALL {
            assert_eq!(
                serde_json::to_string(&provider).unwrap(),
                format!("\"{}\"", provider.as_str())
            );
        }
    }
}
