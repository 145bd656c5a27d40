// Configuration loader
// Loads settings from ~/.ideaforge/config.toml (or an explicit path), falling
// back to API keys in the environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::CONFIG_RELATIVE_PATH;
use super::provider::ProviderEntry;
use super::settings::{Config, PersonaSource, ServerConfig};
use crate::refine::RefineConfig;

/// On-disk shape; `provider` may be omitted when a key is in the environment.
#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    provider: Option<ProviderEntry>,
    #[serde(default)]
    refine: RefineConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    persona: PersonaSource,
}

/// Load configuration.
///
/// `path` wins when given (and must exist); otherwise `~/.ideaforge/config.toml`
/// is read if present. A missing `[provider]` section falls back to
/// `GEMINI_API_KEY`, then `OPENAI_API_KEY`. `IDEAFORGE_*` overrides apply last.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(p) => Some(read_toml(p)?),
        None => match default_config_path() {
            Some(p) if p.exists() => Some(read_toml(&p)?),
            _ => None,
        },
    };

    let (provider, refine, server, persona) = match file {
        Some(t) => (t.provider, t.refine, t.server, t.persona),
        None => (
            None,
            RefineConfig::default(),
            ServerConfig::default(),
            PersonaSource::default(),
        ),
    };

    let provider = match provider.or_else(provider_from_env) {
        Some(p) => p,
        None => bail!(
            "No model provider configured.\n\n\
             Add a [provider] section to ~/.ideaforge/config.toml:\n\n  \
             [provider]\n  \
             type = \"gemini\"\n  \
             api_key = \"...\"\n\n\
             Alternatively, set an environment variable:\n\
             export GEMINI_API_KEY=\"...\""
        ),
    };

    let mut config = Config {
        provider,
        refine,
        server,
        persona,
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    tracing::debug!(
        provider = config.provider.provider_type(),
        min_iterations = config.refine.min_iterations,
        max_iterations = config.refine.max_iterations,
        "Configuration loaded"
    );
    Ok(config)
}

/// `~/.ideaforge/config.toml`, if a home directory exists
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_RELATIVE_PATH))
}

fn read_toml(path: &Path) -> Result<TomlConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn provider_from_env() -> Option<ProviderEntry> {
    let key = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

    if let Some(api_key) = key("GEMINI_API_KEY") {
        return Some(ProviderEntry::Gemini {
            api_key,
            model: None,
            base_url: None,
        });
    }
    key("OPENAI_API_KEY").map(|api_key| ProviderEntry::Openai {
        api_key,
        model: None,
        base_url: None,
    })
}

/// Apply `IDEAFORGE_*` overrides read through `lookup`.
fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("IDEAFORGE_MIN_ITERATIONS") {
        config.refine.min_iterations = v
            .trim()
            .parse()
            .with_context(|| format!("IDEAFORGE_MIN_ITERATIONS is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("IDEAFORGE_MAX_ITERATIONS") {
        config.refine.max_iterations = v
            .trim()
            .parse()
            .with_context(|| format!("IDEAFORGE_MAX_ITERATIONS is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("IDEAFORGE_IMPROVEMENT_THRESHOLD") {
        config.refine.improvement_threshold = v
            .trim()
            .parse()
            .with_context(|| format!("IDEAFORGE_IMPROVEMENT_THRESHOLD is not a number: '{v}'"))?;
    }
    if let Some(v) = lookup("IDEAFORGE_BIND") {
        config.server.bind_address = v.trim().to_string();
    }
    Ok(())
}
