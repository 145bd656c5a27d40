// Persona system for steering idea generation
//
// A persona is pure data: a tone for the generator, a focus for the critic and
// a creative-direction catalog. Swapping personas changes what the loop asks
// for without touching the loop itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A persona defines what kind of ideas the loop asks for and how they are judged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona name (e.g., "constructive", "absurd")
    pub name: String,

    /// Description of this persona
    #[serde(default)]
    pub description: String,

    /// Appended to the generator's system instruction
    pub tone: String,

    /// Appended to the critic's system instruction
    pub critic_focus: String,

    /// Creative-direction catalog sampled into each generation request
    pub directions: Vec<String>,
}

impl Persona {
    /// Load persona from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona from {}", path.display()))?;

        toml::from_str(&contents).context("Failed to parse persona TOML")
    }

    /// Load built-in persona by name
    pub fn load_builtin(name: &str) -> Result<Self> {
        let template = match name {
            "constructive" => include_str!("../../data/personas/constructive.toml"),
            "absurd" => include_str!("../../data/personas/absurd.toml"),
            _ => anyhow::bail!(
                "Unknown builtin persona: {} (available: {})",
                name,
                Self::list_builtins().join(", ")
            ),
        };

        toml::from_str(template)
            .with_context(|| format!("Failed to parse builtin persona: {}", name))
    }

    /// List available builtin personas
    pub fn list_builtins() -> Vec<&'static str> {
        vec!["constructive", "absurd"]
    }

    /// Trim directions, drop blank ones and keep the first of any duplicates.
    pub fn normalize_directions(&mut self) {
        let mut seen = HashSet::new();
        self.directions = std::mem::take(&mut self.directions)
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty() && seen.insert(d.clone()))
            .collect();
    }

    /// Check the persona can feed `directions_per_call` distinct directions.
    pub fn validate(&self, directions_per_call: usize) -> std::result::Result<(), String> {
        if self.tone.trim().is_empty() {
            return Err(format!("persona '{}' has an empty tone", self.name));
        }
        let distinct: HashSet<&str> = self
            .directions
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .collect();
        if distinct.len() < directions_per_call {
            return Err(format!(
                "persona '{}' has {} distinct directions but {} are sampled per call",
                self.name,
                distinct.len(),
                directions_per_call
            ));
        }
        Ok(())
    }
}

impl Default for Persona {
    fn default() -> Self {
        // The constructive persona ships with the binary
        Self::load_builtin("constructive").unwrap_or_else(|_| Self {
            name: "constructive".to_string(),
            description: String::new(),
            tone: "Aim for specific, actionable ideas.".to_string(),
            critic_focus: "Judge originality and feasibility.".to_string(),
            directions: vec![
                "Approach it from the perspective of a complete beginner".to_string(),
                "Make it work on a budget close to zero".to_string(),
                "Borrow a mechanism from an unrelated industry".to_string(),
                "Design it for a small local community".to_string(),
            ],
        })
    }
}
