// Provider factory
//
// Creates the configured model provider

use anyhow::Result;

use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::LlmProvider;
use crate::config::ProviderEntry;

/// Create an `LlmProvider` from a `ProviderEntry`.
pub fn create_provider(entry: &ProviderEntry) -> Result<Box<dyn LlmProvider>> {
    match entry {
        ProviderEntry::Gemini {
            api_key,
            model,
            base_url,
        } => {
            let mut provider = GeminiProvider::new(api_key.clone())?;
            if let Some(m) = model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Box::new(provider))
        }

        ProviderEntry::Openai {
            api_key,
            model,
            base_url,
        } => {
            let mut provider = OpenAiProvider::new(api_key.clone())?;
            if let Some(m) = model {
                provider = provider.with_model(m.clone());
            }
            if let Some(url) = base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Box::new(provider))
        }
    }
}
