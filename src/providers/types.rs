// Unified request types for model providers
//
// A request is one system instruction, an ordered list of prior turns, one new
// user message and the sampling knobs. Each provider maps this onto its own
// wire format.

use serde::{Deserialize, Serialize};

/// Who authored a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior message in the conversation sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
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

/// Sampling knobs for a single model call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// 0.0 to 2.0
    pub temperature: f32,
    /// Nucleus sampling mass, (0.0, 1.0]
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl GenerationSettings {
    pub fn new(temperature: f32, top_p: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            top_p,
            max_output_tokens,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature must be 0.0-2.0, got {}", self.temperature));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(format!("top_p must be in (0.0, 1.0], got {}", self.top_p));
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::new(0.7, 0.95, crate::config::constants::DEFAULT_MAX_OUTPUT_TOKENS)
    }
}

/// Unified request format for all model providers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    /// Model name (empty = provider default)
    pub model: String,

    /// System instruction for this call
    pub system: String,

    /// Earlier turns, oldest first
    pub turns: Vec<Turn>,

    /// The new user message
    pub message: String,

    pub settings: GenerationSettings,
}

impl ProviderRequest {
    /// Create a request with no prior turns and default sampling
    pub fn new(system: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            system: system.into(),
            turns: Vec::new(),
            message: message.into(),
            settings: GenerationSettings::default(),
        }
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the prior conversation turns
    pub fn with_turns(mut self, turns: Vec<Turn>) -> Self {
        self.turns = turns;
        self
    }

    /// Set sampling knobs
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Rough size of the request in characters, for logging.
    pub fn approx_chars(&self) -> usize {
        self.system.len()
            + self.message.len()
            + self.turns.iter().map(|t| t.content.len()).sum::<usize>()
    }
}
