//! Application configuration.
//!
//! Loaded from `config.yaml` in the data directory (or `$MODELCURL_CONFIG`).
//! Supports `${VAR}` and `${VAR:-default}` environment interpolation; a
//! leading `~` in a default expands to the home directory. Every field has a
//! default, so a missing file or an empty one is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inference::Timeouts;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MODELCURL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub stream_timeout_secs: u64,
    /// How long a surfaced error stays visible unless dismissed.
    pub error_dismiss_secs: u64,
    /// `EnvFilter` directive; `RUST_LOG` still wins when set.
    pub log_filter: Option<String>,
    pub history_enabled: bool,
    pub history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            stream_timeout_secs: 600,
            error_dismiss_secs: 5,
            log_filter: None,
            history_enabled: true,
            history_limit: 200,
        }
    }
}

impl AppConfig {
    /// Load from `$MODELCURL_CONFIG` if set (the file must exist), else from
    /// `<data_dir>/config.yaml` if present, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(expand_tilde(&explicit));
            return Self::load_from(&path);
        }

        let path = crate::data_dir().join("config.yaml");
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(raw);
        if interpolated.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
            stream: Duration::from_secs(self.stream_timeout_secs),
        }
    }

    pub fn error_dismiss(&self) -> Duration {
        Duration::from_secs(self.error_dismiss_secs)
    }
}

// ─── Interpolation ───────────────────────────────────────────────────────────

/// Replace `${VAR}` / `${VAR:-default}` with environment values.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
