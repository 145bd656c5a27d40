// OpenAI-compatible chat completions provider
//
// Works for OpenAI and any endpoint speaking the same `/v1/chat/completions`
// format (Groq, Mistral, local gateways).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::ProviderRequest;
use super::LlmProvider;
use crate::config::constants::PROVIDER_TIMEOUT_SECS;

/// OpenAI-compatible API provider
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.openai.com".to_string(),
            default_model: "gpt-4o-mini".to_string(),
        })
    }

    /// Set custom model for this provider
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at another OpenAI-compatible endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert ProviderRequest to OpenAI API format
    fn to_openai_request(&self, request: &ProviderRequest) -> OpenAiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut messages = Vec::with_capacity(request.turns.len() + 2);

        // System prompt goes first as a {"role":"system"} message (OpenAI convention)
        if !request.system.trim().is_empty() {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }

        messages.extend(request.turns.iter().map(|turn| OpenAiMessage {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }));

        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: request.message.clone(),
        });

        OpenAiRequest {
            model,
            messages,
            temperature: request.settings.temperature,
            top_p: request.settings.top_p,
            max_tokens: request.settings.max_output_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn invoke(&self, request: &ProviderRequest) -> Result<String> {
        let body = self.to_openai_request(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        tracing::debug!(
            model = %body.model,
            chars = request.approx_chars(),
            "Sending request to OpenAI-compatible API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "OpenAI API request failed\n\nStatus: {}\nBody: {}",
                status,
                error_body
            );
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to parse OpenAI API response")?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("OpenAI returned no choices in response")?;

        if text.is_empty() {
            anyhow::bail!("OpenAI returned an empty completion");
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// OpenAI API types

#[derive(Debug, Clone, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}
