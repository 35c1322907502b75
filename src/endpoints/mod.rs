//! Saved endpoint profiles and the current selection.
//!
//! An [`Endpoint`] is a base URL plus static credentials and the model to
//! address. The [`EndpointRegistry`] owns the collection; durability is
//! delegated to an [`EndpointStore`].

pub mod errors;
pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};

pub use errors::EndpointError;
pub use registry::EndpointRegistry;
pub use store::{EndpointStore, JsonEndpointStore, MemoryEndpointStore};

/// A saved chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Stable id, generated once on first save.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Base URL, e.g. `https://api.openai.com/v1`. Never ends in `/` once saved.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Extra request headers, in order. Duplicate names are allowed.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub model: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            url: url.into(),
            api_key: None,
            headers: Vec::new(),
            model: model.into(),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Reject profiles missing a name or URL.
    pub fn validate(&self) -> Result<(), EndpointError> {
        if self.name.trim().is_empty() {
            return Err(EndpointError::Validation { field: "name" });
        }
        if self.url.trim().is_empty() {
            return Err(EndpointError::Validation { field: "url" });
        }
        Ok(())
    }

    /// Canonical stored form: trimmed URL without trailing slashes, blank
    /// API key dropped, blank-named headers dropped. Idempotent.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.url = self.url.trim().trim_end_matches('/').to_string();
        self.model = self.model.trim().to_string();
        self.api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.headers.retain(|(name, _)| !name.trim().is_empty());
        self
    }
}
