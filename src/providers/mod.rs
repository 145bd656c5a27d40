// Model provider support
//
// The refinement controller only ever needs one capability from a model:
// "given a system instruction, prior turns, a new message and sampling knobs,
// return the completion text". Every backend implements that behind
// `LlmProvider`.

use anyhow::Result;
use async_trait::async_trait;

pub mod types;

// Provider implementations
pub mod gemini;
pub mod openai;
pub mod scripted;

// Provider factory
pub mod factory;

pub use factory::create_provider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use scripted::ScriptedProvider;
pub use types::{GenerationSettings, ProviderRequest, Role, Turn};

/// Trait for model providers
///
/// Implementations must not retry on their own; a failed call is reported to
/// the caller as-is.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request and return the completion text
    async fn invoke(&self, request: &ProviderRequest) -> Result<String>;

    /// Get the provider name (e.g., "gemini", "openai")
    fn name(&self) -> &str;

    /// Get the default model for this provider
    fn default_model(&self) -> &str;
}
