// Refinement types: Idea, Grade, CritiqueResult, IterationRecord, ConversationResult, RefineConfig

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::RefineError;
use crate::providers::GenerationSettings;

/// Coarse quality label assigned by the critic, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A++")]
    APlusPlus,
}

impl Grade {
    /// Every grade, worst first.
    pub const ALL: [Grade; 5] = [Grade::C, Grade::B, Grade::A, Grade::APlus, Grade::APlusPlus];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::C => "C",
            Grade::B => "B",
            Grade::A => "A",
            Grade::APlus => "A+",
            Grade::APlusPlus => "A++",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("'{s}' is not one of C, B, A, A+, A++"))
    }
}

/// A single generated idea
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    /// Opaque identifier, unique within a run and iteration
    pub id: String,
    pub title: String,
    pub description: String,
    /// Critic rating 0–100 (0 until merged with a critique)
    #[serde(default)]
    pub rating: u8,
}

impl Idea {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            rating: 0,
        }
    }

    /// Copy of this idea carrying a critic rating.
    pub fn with_rating(&self, rating: u8) -> Self {
        Self {
            rating,
            ..self.clone()
        }
    }
}

/// Validated critic verdict for one batch of ideas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueResult {
    /// One rating per idea, positionally aligned with the critiqued batch
    pub ratings: Vec<u8>,
    pub feedback: String,
    #[serde(rename = "overallScore")]
    pub overall_score: Grade,
}

impl CritiqueResult {
    /// Mean rating, 0.0 for an empty list.
    pub fn average_rating(&self) -> f64 {
        average(&self.ratings)
    }
}

/// Mean of a rating list, 0.0 when empty
pub fn average(ratings: &[u8]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64
}

/// One generate-then-critique pass, recorded as produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    /// Ideas exactly as the generator produced them (rating 0)
    pub ideas: Vec<Idea>,
    pub feedback: String,
    pub score: Grade,
    pub ratings: Vec<u8>,
}

impl IterationRecord {
    pub fn new(ideas: Vec<Idea>, critique: &CritiqueResult) -> Self {
        Self {
            ideas,
            feedback: critique.feedback.clone(),
            score: critique.overall_score,
            ratings: critique.ratings.clone(),
        }
    }

    /// Ideas with their critic ratings attached.
    pub fn rated_ideas(&self) -> Vec<Idea> {
        self.ideas
            .iter()
            .zip(&self.ratings)
            .map(|(idea, &rating)| idea.with_rating(rating))
            .collect()
    }

    pub fn critique(&self) -> CritiqueResult {
        CritiqueResult {
            ratings: self.ratings.clone(),
            feedback: self.feedback.clone(),
            overall_score: self.score,
        }
    }
}

/// Final outcome of a successful run, handed to the UI as an immutable snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_prompt: String,
    /// Prompt used for the last generation pass (may carry critic feedback)
    pub enhanced_prompt: String,
    /// Selected iteration's ideas, ratings attached
    pub ideas: Vec<Idea>,
    pub feedback: String,
    pub iteration_count: usize,
    pub best_score: Grade,
    pub improvement_threshold_met: bool,
    pub history: Vec<IterationRecord>,
}

/// Controller state, reported to observers as the run advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunPhase {
    Idle,
    Enhancing,
    Generating { iteration: usize },
    Critiquing { iteration: usize },
    Deciding { iteration: usize },
    Finalizing,
    Done,
    Failed,
}

impl RunPhase {
    /// True once the run can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

/// Which iteration the final result reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
    /// Highest grade, ties broken by average rating
    #[default]
    Best,
    /// Whatever the final iteration produced
    Latest,
}

/// What a submission does when a run is already active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    #[default]
    Reject,
    /// Abandon the active run and start the new one
    Replace,
}

/// Knobs for the refinement loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Iterations always run regardless of score or improvement
    pub min_iterations: usize,
    /// Hard cap on generate/critique passes
    pub max_iterations: usize,
    /// Fractional average-rating gain needed to keep going (0.02 = 2%)
    pub improvement_threshold: f64,
    /// Ideas rated at or above this are kept on regeneration
    pub keep_rating_cutoff: u8,
    /// Creative directions sampled into each generation request
    pub directions_per_call: usize,
    pub ideas_min: usize,
    pub ideas_max: usize,
    /// Longest accepted prompt, in characters
    pub max_prompt_chars: usize,
    pub selection: SelectionPolicy,
    pub busy_policy: BusyPolicy,
    pub enhance: GenerationSettings,
    pub generate: GenerationSettings,
    pub critique: GenerationSettings,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            min_iterations: 2,
            max_iterations: 5,
            improvement_threshold: 0.02,
            keep_rating_cutoff: 90,
            directions_per_call: 4,
            ideas_min: 3,
            ideas_max: 5,
            max_prompt_chars: 2000,
            selection: SelectionPolicy::Best,
            busy_policy: BusyPolicy::Reject,
            enhance: GenerationSettings::new(0.7, 0.95, 512),
            generate: GenerationSettings::new(0.9, 0.95, 4096),
            critique: GenerationSettings::new(0.2, 0.9, 2048),
        }
    }
}

impl RefineConfig {
    /// Check the knobs are mutually consistent.
    pub fn validate(&self) -> Result<(), RefineError> {
        if self.max_iterations == 0 {
            return Err(RefineError::Config("max_iterations must be at least 1".into()));
        }
        if self.max_iterations < self.min_iterations {
            return Err(RefineError::Config(format!(
                "max_iterations ({}) must not be below min_iterations ({})",
                self.max_iterations, self.min_iterations
            )));
        }
        if !self.improvement_threshold.is_finite() || self.improvement_threshold < 0.0 {
            return Err(RefineError::Config(format!(
                "improvement_threshold must be a non-negative number, got {}",
                self.improvement_threshold
            )));
        }
        if self.keep_rating_cutoff > 100 {
            return Err(RefineError::Config(format!(
                "keep_rating_cutoff must be 0-100, got {}",
                self.keep_rating_cutoff
            )));
        }
        if self.ideas_min == 0 || self.ideas_min > self.ideas_max {
            return Err(RefineError::Config(format!(
                "idea range {}-{} is invalid",
                self.ideas_min, self.ideas_max
            )));
        }
        if self.directions_per_call == 0 {
            return Err(RefineError::Config("directions_per_call must be at least 1".into()));
        }
        if self.max_prompt_chars == 0 {
            return Err(RefineError::Config("max_prompt_chars must be at least 1".into()));
        }
        for (name, settings) in [
            ("enhance", &self.enhance),
            ("generate", &self.generate),
            ("critique", &self.critique),
        ] {
            settings
                .validate()
                .map_err(|e| RefineError::Config(format!("[{name}] {e}")))?;
        }
        Ok(())
    }
}
