// Iterative idea refinement
//
// Enhance a prompt once, then alternate generation and critique until the
// ratings stop improving. Personas supply tone and creative directions.

pub mod directions;
pub mod error;
pub mod extract;
pub mod loop_runner;
pub mod prompts;
pub mod scoring;
pub mod types;
pub mod validate;

pub use error::RefineError;
pub use extract::{extract_json, ExtractionError};
pub use loop_runner::{parse_ideas, should_continue, RefineLoop};
pub use scoring::{fractional_improvement, is_better, rank};
pub use types::{
    BusyPolicy, ConversationResult, CritiqueResult, Grade, Idea, IterationRecord, RefineConfig,
    RunPhase, SelectionPolicy,
};
pub use validate::{check_critique, is_valid_critique};
