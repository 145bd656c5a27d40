// Model provider entry

use serde::{Deserialize, Serialize};

/// Which hosted model backs the loop.
///
/// Serializes with a `type` tag, e.g.:
/// ```toml
/// [provider]
/// type = "gemini"
/// api_key = "AIza..."
/// model = "gemini-1.5-pro"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderEntry {
    Gemini {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Openai {
        api_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl ProviderEntry {
    /// Provider name as used in logs and the `type` tag
    pub fn provider_type(&self) -> &'static str {
        match self {
            Self::Gemini { .. } => "gemini",
            Self::Openai { .. } => "openai",
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            Self::Gemini { api_key, .. } | Self::Openai { api_key, .. } => api_key,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Gemini { model, .. } | Self::Openai { model, .. } => model.as_deref(),
        }
    }
}
