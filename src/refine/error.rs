// Refinement error kinds
//
// One variant per way a run can end without a result. The Display text is
// exactly what the run slot surfaces to the UI.

use thiserror::Error;

/// Errors that abort (or prevent) a refinement run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefineError {
    /// Empty, whitespace-only or oversized prompt; no model call was made
    #[error("Invalid prompt: {0}")]
    UserInput(String),

    /// The enhancement call failed or returned nothing usable
    #[error("Prompt enhancement failed: {0}")]
    Enhancement(String),

    /// Generator output had no parseable JSON array of ideas
    #[error("Could not parse generated ideas: {0}")]
    GenerationParse(String),

    /// Critic output had no parseable JSON object
    #[error("Could not parse critique: {0}")]
    CritiqueParse(String),

    /// Critic output parsed but broke the critique shape contract
    #[error("Critique failed validation: {0}")]
    CritiqueValidation(String),

    /// Transport, auth or rate-limit failure from the model provider
    #[error("Model provider error: {0}")]
    Provider(String),

    /// A run is already active and the busy policy rejects new submissions
    #[error("A run is already in progress; wait for it to finish or cancel it")]
    RunInProgress,

    /// The run was abandoned before it finished
    #[error("Run cancelled")]
    Cancelled,

    /// Invalid refinement knobs or persona
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The run task died without producing an outcome
    #[error("Run stopped unexpectedly: {0}")]
    Internal(String),
}

impl RefineError {
    /// Stable snake_case label for logs and HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserInput(_) => "user_input",
            Self::Enhancement(_) => "enhancement_failure",
            Self::GenerationParse(_) => "generation_parse",
            Self::CritiqueParse(_) => "critique_parse",
            Self::CritiqueValidation(_) => "critique_validation",
            Self::Provider(_) => "provider",
            Self::RunInProgress => "run_in_progress",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Wrap a provider failure, keeping the whole context chain.
    pub fn provider(err: &anyhow::Error) -> Self {
        Self::Provider(format!("{err:#}"))
    }

    /// True for errors caused by what the user typed rather than by the system.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UserInput(_) | Self::RunInProgress)
    }
}
