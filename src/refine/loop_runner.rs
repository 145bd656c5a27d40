// Refinement loop runner: enhance once, then generate + critique until the stopping rule fires

use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::directions::sample_directions;
use super::error::RefineError;
use super::extract::extract_json;
use super::prompts::{
    augmented_prompt, critic_system, critique_message, critique_transcript_summary,
    generation_message, generator_system, ENHANCER_SYSTEM,
};
use super::scoring::{fractional_improvement, is_better};
use super::types::{
    ConversationResult, CritiqueResult, Idea, IterationRecord, RefineConfig, RunPhase,
    SelectionPolicy,
};
use super::validate::check_critique;
use crate::config::Persona;
use crate::providers::{LlmProvider, ProviderRequest, Turn};

/// The refinement loop.
///
/// Drives one run through its phases:
/// - Enhancing: rewrite the raw prompt once
/// - Generating / Critiquing / Deciding: repeated until the stopping rule fires
/// - Finalizing: assemble the result from the selected iteration
///
/// Any collaborator, extraction or validation failure aborts the run; no
/// partial result is ever returned and nothing is retried.
pub struct RefineLoop {
    provider: Arc<dyn LlmProvider>,
    persona: Persona,
    config: RefineConfig,
    generator_system: String,
    critic_system: String,
}

/// In-progress state of a single run. Dropped wholesale on failure.
struct RunState {
    original_prompt: String,
    enhanced_base: String,
    /// Prompt used for the most recent generation pass
    current_prompt: String,
    history: Vec<IterationRecord>,
    /// Index into `history` of the best iteration so far
    best: Option<usize>,
    /// Critic's previous exchange, replayed as prior turns
    critic_turns: Vec<Turn>,
    last_improvement: f64,
}

/// Outcome of the Deciding phase for one iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub average: f64,
    pub improvement: f64,
    pub continue_loop: bool,
}

impl RefineLoop {
    /// Build a loop, rejecting inconsistent knobs or an undersized persona catalog.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        mut persona: Persona,
        config: RefineConfig,
    ) -> Result<Self, RefineError> {
        config.validate()?;
        persona.normalize_directions();
        persona
            .validate(config.directions_per_call)
            .map_err(RefineError::Config)?;

        let generator_system = generator_system(&persona, &config);
        let critic_system = critic_system(&persona);

        Ok(Self {
            provider,
            persona,
            config,
            generator_system,
            critic_system,
        })
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Reject empty, whitespace-only or oversized prompts. Returns the trimmed prompt.
    pub fn validate_prompt(&self, prompt: &str) -> Result<String, RefineError> {
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return Err(RefineError::UserInput("prompt must not be empty".into()));
        }
        let chars = trimmed.chars().count();
        if chars > self.config.max_prompt_chars {
            return Err(RefineError::UserInput(format!(
                "prompt is {} characters; the limit is {}",
                chars, self.config.max_prompt_chars
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Run the full loop for one prompt.
    pub async fn run(&self, prompt: &str) -> Result<ConversationResult, RefineError> {
        self.run_observed(prompt, &|_| {}).await
    }

    /// Run the full loop, reporting every phase change to `observe`.
    ///
    /// An invalid prompt is rejected before any phase is reported.
    pub async fn run_observed(
        &self,
        prompt: &str,
        observe: &(dyn Fn(RunPhase) + Send + Sync),
    ) -> Result<ConversationResult, RefineError> {
        let prompt = self.validate_prompt(prompt)?;
        let span = tracing::info_span!("refine_run", run_id = %Uuid::new_v4());

        async {
            match self.drive(prompt, observe).await {
                Ok(result) => {
                    observe(RunPhase::Done);
                    tracing::info!(
                        iterations = result.iteration_count,
                        grade = %result.best_score,
                        "Run finished"
                    );
                    Ok(result)
                }
                Err(e) => {
                    observe(RunPhase::Failed);
                    tracing::error!(kind = e.kind(), error = %e, "Run aborted");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        prompt: String,
        observe: &(dyn Fn(RunPhase) + Send + Sync),
    ) -> Result<ConversationResult, RefineError> {
        // ── 1. Enhance the raw prompt ───────────────────────────────────────
        observe(RunPhase::Enhancing);
        let enhanced = self.enhance(&prompt).await?;
        let mut state = RunState::new(prompt, enhanced);

        loop {
            let iteration = state.history.len() + 1;

            // ── 2. Generate ideas ───────────────────────────────────────────
            observe(RunPhase::Generating { iteration });
            let previous = state.history.last();
            let gen_prompt =
                augmented_prompt(&state.enhanced_base, previous.map(|r| r.feedback.as_str()));
            let ideas = self.generate(&gen_prompt, previous).await?;

            // ── 3. Critique them ────────────────────────────────────────────
            observe(RunPhase::Critiquing { iteration });
            let (critique, raw_critique) = self
                .critique(&state.original_prompt, &gen_prompt, &ideas, previous, &state.critic_turns)
                .await?;

            // ── 4. Record and decide ────────────────────────────────────────
            observe(RunPhase::Deciding { iteration });
            state.critic_turns = vec![
                Turn::user(critique_transcript_summary(iteration, &ideas)),
                Turn::assistant(raw_critique),
            ];
            state.current_prompt = gen_prompt;
            let decision = state.record(ideas, &critique, &self.config);

            tracing::info!(
                iteration,
                avg_rating = decision.average,
                improvement = decision.improvement,
                grade = %critique.overall_score,
                continue_loop = decision.continue_loop,
                "Iteration complete"
            );

            if !decision.continue_loop {
                break;
            }
        }

        // ── 5. Finalize ─────────────────────────────────────────────────────
        observe(RunPhase::Finalizing);
        Ok(state.finalize(&self.config))
    }

    /// Rewrite the raw prompt into a generation-friendly request.
    async fn enhance(&self, prompt: &str) -> Result<String, RefineError> {
        let request = ProviderRequest::new(ENHANCER_SYSTEM, prompt)
            .with_settings(self.config.enhance);

        let raw = self
            .provider
            .invoke(&request)
            .await
            .map_err(|e| RefineError::Enhancement(format!("{e:#}")))?;

        let enhanced = clean_enhanced(&raw);
        if enhanced.is_empty() {
            return Err(RefineError::Enhancement(
                "model returned an empty prompt".into(),
            ));
        }
        tracing::debug!(chars = enhanced.len(), "Prompt enhanced");
        Ok(enhanced)
    }

    /// Ask the generator for a fresh batch of ideas.
    async fn generate(
        &self,
        prompt: &str,
        previous: Option<&IterationRecord>,
    ) -> Result<Vec<Idea>, RefineError> {
        let directions = sample_directions(&self.persona.directions, self.config.directions_per_call);
        let message =
            generation_message(prompt, &directions, previous, self.config.keep_rating_cutoff);
        let request = ProviderRequest::new(self.generator_system.as_str(), message)
            .with_settings(self.config.generate);

        let raw = self
            .provider
            .invoke(&request)
            .await
            .map_err(|e| RefineError::provider(&e))?;

        let ideas = parse_ideas(&raw)?;
        if !(self.config.ideas_min..=self.config.ideas_max).contains(&ideas.len()) {
            tracing::warn!(
                count = ideas.len(),
                min = self.config.ideas_min,
                max = self.config.ideas_max,
                "Generator returned an unexpected number of ideas"
            );
        }
        Ok(ideas)
    }

    /// Ask the critic to rate `ideas`; returns the validated critique and its raw text.
    async fn critique(
        &self,
        original_prompt: &str,
        prompt: &str,
        ideas: &[Idea],
        previous: Option<&IterationRecord>,
        prior_turns: &[Turn],
    ) -> Result<(CritiqueResult, String), RefineError> {
        let previous_ideas = previous.map(IterationRecord::rated_ideas);
        let message = critique_message(original_prompt, prompt, ideas, previous_ideas.as_deref());
        let request = ProviderRequest::new(self.critic_system.as_str(), message)
            .with_turns(prior_turns.to_vec())
            .with_settings(self.config.critique);

        let raw = self
            .provider
            .invoke(&request)
            .await
            .map_err(|e| RefineError::provider(&e))?;

        let value = extract_json(&raw).map_err(|e| RefineError::CritiqueParse(e.to_string()))?;
        let critique = check_critique(&value).map_err(|reason| {
            tracing::warn!(%reason, "Critique rejected");
            RefineError::CritiqueValidation(reason)
        })?;

        if critique.ratings.len() != ideas.len() {
            return Err(RefineError::CritiqueValidation(format!(
                "{} ratings for {} ideas",
                critique.ratings.len(),
                ideas.len()
            )));
        }
        Ok((critique, raw))
    }
}

impl RunState {
    fn new(original_prompt: String, enhanced: String) -> Self {
        Self {
            original_prompt,
            current_prompt: enhanced.clone(),
            enhanced_base: enhanced,
            history: Vec::new(),
            best: None,
            critic_turns: Vec::new(),
            last_improvement: 0.0,
        }
    }

    /// Append the iteration, update the best snapshot and apply the stopping rule.
    fn record(
        &mut self,
        ideas: Vec<Idea>,
        critique: &CritiqueResult,
        config: &RefineConfig,
    ) -> Decision {
        let previous_avg = self.history.last().map(|r| r.critique().average_rating());
        let average = critique.average_rating();
        let improvement = fractional_improvement(previous_avg, average);

        self.history.push(IterationRecord::new(ideas, critique));
        let index = self.history.len() - 1;

        let replace_best = match self.best {
            None => true,
            Some(best) => is_better(critique, &self.history[best].critique()),
        };
        if replace_best {
            self.best = Some(index);
        }
        self.last_improvement = improvement;

        Decision {
            average,
            improvement,
            continue_loop: should_continue(self.history.len(), improvement, config),
        }
    }

    fn finalize(self, config: &RefineConfig) -> ConversationResult {
        let last = self.history.len().saturating_sub(1);
        let selected = match config.selection {
            SelectionPolicy::Best => self.best.unwrap_or(last),
            SelectionPolicy::Latest => last,
        };
        let chosen = &self.history[selected];

        ConversationResult {
            id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            original_prompt: self.original_prompt,
            enhanced_prompt: self.current_prompt,
            ideas: chosen.rated_ideas(),
            feedback: chosen.feedback.clone(),
            iteration_count: self.history.len(),
            best_score: chosen.score,
            improvement_threshold_met: self.last_improvement >= config.improvement_threshold,
            history: self.history,
        }
    }
}

/// Stopping rule: keep going while under the cap and either under the floor
/// or still improving by at least the threshold.
pub fn should_continue(iteration_count: usize, improvement: f64, config: &RefineConfig) -> bool {
    iteration_count < config.max_iterations
        && (iteration_count < config.min_iterations
            || improvement >= config.improvement_threshold)
}

/// Convert generator output into ideas. Anything but a non-empty array of
/// `{title, description}` objects is a parse error.
pub fn parse_ideas(raw: &str) -> Result<Vec<Idea>, RefineError> {
    let value = extract_json(raw).map_err(|e| RefineError::GenerationParse(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(RefineError::GenerationParse(format!(
                "expected a JSON array of ideas, got {}",
                if other.is_object() { "an object" } else { "a scalar" }
            )))
        }
    };
    if items.is_empty() {
        return Err(RefineError::GenerationParse(
            "generator returned an empty list".into(),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let field = |name: &str| {
                item.get(name)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        RefineError::GenerationParse(format!(
                            "idea #{} has no usable '{}'",
                            i + 1,
                            name
                        ))
                    })
            };
            Ok(Idea::new(field("title")?, field("description")?))
        })
        .collect()
}

/// Trim whitespace and one layer of wrapping quotes from the enhancer's reply.
fn clean_enhanced(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}
