// Google Gemini API provider implementation
//
// Gemini takes the system instruction as a separate `systemInstruction`
// content, calls the assistant role "model", and nests sampling knobs under
// `generationConfig`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::{ProviderRequest, Role};
use super::LlmProvider;
use crate::config::constants::PROVIDER_TIMEOUT_SECS;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            default_model: "gemini-1.5-flash".to_string(),
        })
    }

    /// Create with custom default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at a different endpoint (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert ProviderRequest to Gemini API format
    fn to_gemini_request(&self, request: &ProviderRequest) -> GeminiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut contents: Vec<GeminiContent> = request
            .turns
            .iter()
            .map(|turn| GeminiContent {
                // Gemini uses "model" instead of "assistant"
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: turn.content.clone(),
                }],
            })
            .collect();

        contents.push(GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart {
                text: request.message.clone(),
            }],
        });

        let system_instruction = if request.system.trim().is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system.clone(),
                }],
            })
        };

        GeminiRequest {
            model,
            system_instruction,
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: request.settings.temperature,
                top_p: request.settings.top_p,
                max_output_tokens: request.settings.max_output_tokens,
            },
        }
    }

    /// Pull the completion text out of a Gemini response
    fn response_text(response: GeminiResponse) -> Result<String> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .context("Gemini returned no candidates in response")?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            anyhow::bail!(
                "Gemini returned an empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            );
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn invoke(&self, request: &ProviderRequest) -> Result<String> {
        let gemini_request = self.to_gemini_request(request);
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, gemini_request.model
        );

        tracing::debug!(
            model = %gemini_request.model,
            chars = request.approx_chars(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to send request to Gemini API")?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Gemini API request failed\n\nStatus: {}\nBody: {}",
                status,
                error_body
            );
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to parse Gemini API response")?;

        Self::response_text(gemini_response)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// Gemini API types

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip)]
    model: String, // Used in URL, not in body
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>, // "user" or "model"
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}
