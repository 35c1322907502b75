//! Normalized reasoning configuration and its mapping onto provider fields.
//!
//! The display layer edits a single [`ReasoningConfig`] regardless of which
//! provider the selected model belongs to. [`map_reasoning`] turns it into the
//! subset of fields the detected provider understands, filling gaps from the
//! [`ProviderDefaults`] table. Fields meaningless to a provider are omitted.

use serde::{Deserialize, Serialize};

use super::classifier::ReasoningProvider;

/// OpenAI `reasoning_effort` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    #[default]
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::None => "none",
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl std::str::FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ReasoningEffort::None),
            "minimal" => Ok(ReasoningEffort::Minimal),
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            other => Err(format!(
                "unknown reasoning effort '{other}' (expected none, minimal, low, medium or high)"
            )),
        }
    }
}

/// Normalized reasoning settings as edited by the user.
///
/// `None` means "not set": the provider default applies. Zero token counts
/// are treated as unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningConfig {
    #[serde(default)]
    pub enable_thinking: bool,
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default)]
    pub max_completion_tokens: Option<u32>,
    #[serde(default)]
    pub thinking_budget_tokens: Option<u32>,
}

impl ReasoningConfig {
    /// A config pre-filled with the defaults of `provider`.
    pub fn for_provider(provider: ReasoningProvider) -> Self {
        let defaults = ProviderDefaults::of(provider);
        Self {
            enable_thinking: defaults.enable_thinking,
            reasoning_effort: defaults.reasoning_effort,
            max_completion_tokens: defaults.max_completion_tokens,
            thinking_budget_tokens: defaults.thinking_budget_tokens,
        }
    }
}

// ─── Provider defaults ───────────────────────────────────────────────────────

/// Policy defaults for one provider. `None` marks a field the provider never
/// receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub reasoning_effort: Option<ReasoningEffort>,
    pub max_completion_tokens: Option<u32>,
    pub enable_thinking: bool,
    pub thinking_budget_tokens: Option<u32>,
}

const PROVIDER_DEFAULTS: [(ReasoningProvider, ProviderDefaults); 4] = [
    (
        ReasoningProvider::OpenAI,
        ProviderDefaults {
            reasoning_effort: Some(ReasoningEffort::Medium),
            max_completion_tokens: Some(2048),
            enable_thinking: false,
            thinking_budget_tokens: None,
        },
    ),
    (
        ReasoningProvider::DeepSeek,
        ProviderDefaults {
            reasoning_effort: None,
            max_completion_tokens: None,
            enable_thinking: false,
            thinking_budget_tokens: None,
        },
    ),
    (
        ReasoningProvider::Qwen,
        ProviderDefaults {
            reasoning_effort: None,
            max_completion_tokens: None,
            enable_thinking: false,
            thinking_budget_tokens: Some(8000),
        },
    ),
    (
        ReasoningProvider::Claude,
        ProviderDefaults {
            reasoning_effort: None,
            max_completion_tokens: None,
            enable_thinking: false,
            thinking_budget_tokens: Some(20000),
        },
    ),
];

impl ProviderDefaults {
    pub fn of(provider: ReasoningProvider) -> ProviderDefaults {
        PROVIDER_DEFAULTS
            .iter()
            .find(|(p, _)| *p == provider)
            .map(|(_, d)| *d)
            .unwrap_or(ProviderDefaults {
                reasoning_effort: None,
                max_completion_tokens: None,
                enable_thinking: false,
                thinking_budget_tokens: None,
            })
    }
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

/// The provider-specific subset of reasoning fields to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasoningFields {
    pub reasoning_effort: Option<ReasoningEffort>,
    pub max_completion_tokens: Option<u32>,
    pub enable_thinking: Option<bool>,
    pub thinking_budget_tokens: Option<u32>,
}

impl ReasoningFields {
    pub fn is_empty(&self) -> bool {
        *self == ReasoningFields::default()
    }

    /// Names of the populated fields, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.reasoning_effort.is_some() {
            names.push("reasoning_effort");
        }
        if self.max_completion_tokens.is_some() {
            names.push("max_completion_tokens");
        }
        if self.enable_thinking.is_some() {
            names.push("enable_thinking");
        }
        if self.thinking_budget_tokens.is_some() {
            names.push("thinking_budget_tokens");
        }
        names
    }
}

/// Map a normalized config onto the fields `provider` understands.
///
/// | provider | emits |
/// |---|---|
/// | openai | `reasoning_effort`, `max_completion_tokens` |
/// | deepseek | `enable_thinking` |
/// | qwen / claude | `enable_thinking`; `thinking_budget_tokens` only while thinking is on |
/// | none | nothing |
pub fn map_reasoning(
    provider: Option<ReasoningProvider>,
    config: &ReasoningConfig,
) -> ReasoningFields {
    let Some(provider) = provider else {
        return ReasoningFields::default();
    };
    let defaults = ProviderDefaults::of(provider);

    match provider {
        ReasoningProvider::OpenAI => ReasoningFields {
            reasoning_effort: config.reasoning_effort.or(defaults.reasoning_effort),
            max_completion_tokens: positive(config.max_completion_tokens)
                .or(defaults.max_completion_tokens),
            enable_thinking: None,
            thinking_budget_tokens: None,
        },
        ReasoningProvider::DeepSeek => ReasoningFields {
            enable_thinking: Some(config.enable_thinking),
            ..ReasoningFields::default()
        },
        ReasoningProvider::Qwen | ReasoningProvider::Claude => ReasoningFields {
            enable_thinking: Some(config.enable_thinking),
            thinking_budget_tokens: if config.enable_thinking {
                positive(config.thinking_budget_tokens).or(defaults.thinking_budget_tokens)
            } else {
                None
            },
            ..ReasoningFields::default()
        },
    }
}

fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_configs() -> Vec<ReasoningConfig> {
        vec![
            ReasoningConfig::default(),
            ReasoningConfig {
                enable_thinking: true,
                reasoning_effort: Some(ReasoningEffort::High),
                max_completion_tokens: Some(9000),
                thinking_budget_tokens: Some(12345),
            },
            ReasoningConfig::for_provider(ReasoningProvider::Claude),
        ]
    }

    #[test]
    fn test_openai_defaults() {
        let fields = map_reasoning(Some(ReasoningProvider::OpenAI), &ReasoningConfig::default());
        assert_eq!(fields.reasoning_effort, Some(ReasoningEffort::Medium));
        assert_eq!(fields.max_completion_tokens, Some(2048));
        assert_eq!(fields.enable_thinking, None);
        assert_eq!(fields.thinking_budget_tokens, None);
    }

    #[test]
    fn test_openai_honors_caller_values() {
        let config = ReasoningConfig {
            enable_thinking: true,
            reasoning_effort: Some(ReasoningEffort::Low),
            max_completion_tokens: Some(4096),
            thinking_budget_tokens: Some(20000),
        };
        let fields = map_reasoning(Some(ReasoningProvider::OpenAI), &config);
        assert_eq!(fields.reasoning_effort, Some(ReasoningEffort::Low));
        assert_eq!(fields.max_completion_tokens, Some(4096));
        assert_eq!(fields.enable_thinking, None);
        assert_eq!(fields.thinking_budget_tokens, None);
    }

    #[test]
    fn test_openai_zero_completion_tokens_uses_default() {
        let config = ReasoningConfig {
            max_completion_tokens: Some(0),
            ..ReasoningConfig::default()
        };
        let fields = map_reasoning(Some(ReasoningProvider::OpenAI), &config);
        assert_eq!(fields.max_completion_tokens, Some(2048));
    }

    #[test]
    fn test_deepseek_emits_only_enable_thinking() {
        for config in all_configs() {
            let fields = map_reasoning(Some(ReasoningProvider::DeepSeek), &config);
            assert_eq!(fields.enable_thinking, Some(config.enable_thinking));
            assert_eq!(fields.field_names(), vec!["enable_thinking"]);
        }
    }

    #[test]
    fn test_qwen_disabled_never_emits_budget() {
        let config = ReasoningConfig {
            enable_thinking: false,
            thinking_budget_tokens: Some(31337),
            ..ReasoningConfig::default()
        };
        let fields = map_reasoning(Some(ReasoningProvider::Qwen), &config);
        assert_eq!(fields.enable_thinking, Some(false));
        assert_eq!(fields.thinking_budget_tokens, None);
    }

    #[test]
    fn test_qwen_enabled_default_budget() {
        let config = ReasoningConfig {
            enable_thinking: true,
            ..ReasoningConfig::default()
        };
        let fields = map_reasoning(Some(ReasoningProvider::Qwen), &config);
        assert_eq!(fields.thinking_budget_tokens, Some(8000));
    }

    #[test]
    fn test_claude_enabled_default_budget() {
        let config = ReasoningConfig {
            enable_thinking: true,
            ..ReasoningConfig::default()
        };
        let fields = map_reasoning(Some(ReasoningProvider::Claude), &config);
        assert_eq!(fields.enable_thinking, Some(true));
        assert_eq!(fields.thinking_budget_tokens, Some(20000));
        assert_eq!(fields.reasoning_effort, None);
        assert_eq!(fields.max_completion_tokens, None);
    }

    #[test]
    fn test_claude_disabled_omits_budget() {
        let config = ReasoningConfig::for_provider(ReasoningProvider::Claude);
        let fields = map_reasoning(Some(ReasoningProvider::Claude), &config);
        assert_eq!(fields.enable_thinking, Some(false));
        assert_eq!(fields.thinking_budget_tokens, None);
    }

    #[test]
    fn test_none_provider_is_always_empty() {
        for config in all_configs() {
            assert!(map_reasoning(None, &config).is_empty());
        }
    }

    #[test]
    fn test_for_provider_defaults() {
        let openai = ReasoningConfig::for_provider(ReasoningProvider::OpenAI);
        assert_eq!(openai.reasoning_effort, Some(ReasoningEffort::Medium));
        assert_eq!(openai.max_completion_tokens, Some(2048));
        let qwen = ReasoningConfig::for_provider(ReasoningProvider::Qwen);
        assert_eq!(qwen.thinking_budget_tokens, Some(8000));
        assert!(!qwen.enable_thinking);
    }

    #[test]
    fn test_effort_parse() {
        assert_eq!("HIGH".parse::<ReasoningEffort>(), Ok(ReasoningEffort::High));
        assert!("extreme".parse::<ReasoningEffort>().is_err());
        assert_eq!(ReasoningEffort::default(), ReasoningEffort::Medium);
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: ReasoningConfig =
            serde_json::from_str(r#"{"enableThinking":true,"thinkingBudgetTokens":1000}"#)
                .unwrap();
        assert!(config.enable_thinking);
        assert_eq!(config.thinking_budget_tokens, Some(1000));
        assert_eq!(config.reasoning_effort, None);
    }
}
