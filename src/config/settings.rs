// Configuration structs

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_PERSONA, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_RPS,
};
use super::persona::Persona;
use super::provider::ProviderEntry;
use crate::refine::RefineConfig;

/// Server configuration for `ideaforge serve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    /// Sustained run submissions per second, per client IP
    pub rate_limit_rps: u32,
    /// Submission burst size, per client IP
    pub rate_limit_burst: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDR.to_string(),
            cors_origins: vec![],
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
        }
    }
}

/// Persona selection: a builtin by name, or a full inline definition
///
/// ```toml
/// persona = "absurd"
/// ```
/// or
/// ```toml
/// [persona]
/// name = "mine"
/// tone = "..."
/// critic_focus = "..."
/// directions = ["...", "..."]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonaSource {
    Builtin(String),
    Inline(Persona),
}

impl Default for PersonaSource {
    fn default() -> Self {
        Self::Builtin(DEFAULT_PERSONA.to_string())
    }
}

impl PersonaSource {
    pub fn resolve(&self) -> Result<Persona> {
        match self {
            Self::Builtin(name) => Persona::load_builtin(name),
            Self::Inline(persona) => Ok(persona.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Model provider backing all three roles
    pub provider: ProviderEntry,

    /// Loop knobs
    pub refine: RefineConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Active persona
    pub persona: PersonaSource,
}

impl Config {
    pub fn new(provider: ProviderEntry) -> Self {
        Self {
            provider,
            refine: RefineConfig::default(),
            server: ServerConfig::default(),
            persona: PersonaSource::default(),
        }
    }

    /// Validate configuration and return helpful errors
    pub fn validate(&self) -> Result<()> {
        if self.provider.api_key().trim().is_empty() {
            bail!(
                "{} API key is empty\n\n\
                 Set it in ~/.ideaforge/config.toml under [provider], or export \
                 GEMINI_API_KEY / OPENAI_API_KEY",
                self.provider.provider_type()
            );
        }

        self.refine.validate()?;

        let persona = self.persona.resolve()?;
        if let Err(reason) = persona.validate(self.refine.directions_per_call) {
            bail!("Invalid persona: {}", reason);
        }

        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            bail!(
                "Invalid bind address: '{}'\n\
                 Bind address should be in format 'IP:PORT'\n\
                 Examples:\n  \
                 • 127.0.0.1:8080\n  \
                 • 0.0.0.0:8080",
                self.server.bind_address
            );
        }

        if self.server.rate_limit_rps == 0 || self.server.rate_limit_burst == 0 {
            bail!("rate_limit_rps and rate_limit_burst must be greater than 0");
        }

        Ok(())
    }
}
