// Prompt construction for the three model roles: enhancer, generator, critic
//
// Fixed instructions live here; anything that varies between deployments
// (tone, critic focus, idea counts, keep cutoff) is injected from the persona
// and the refinement config.

use serde_json::json;

use super::types::{Idea, IterationRecord, RefineConfig};
use crate::config::Persona;

/// Output rules shared by every structured-output request.
///
/// Prepended to the generator and critic system instructions.
pub const OUTPUT_DISCIPLINE: &str = "\
## Output Discipline

These rules override any stylistic defaults:

1. When asked for JSON, return ONLY the JSON. No markdown code fences. No prose before \
or after. The first character of your response must be `[` or `{`.
2. Use the field names given in the schema verbatim: no renaming, no extras.
3. Do not add caveats, disclaimers or explanations unless explicitly asked.";

/// System instruction for the one-off enhancement call.
pub const ENHANCER_SYSTEM: &str = "\
You rewrite a user's raw request into a clear instruction for an idea generator.

Rules:
- Keep the subject matter exactly as the user gave it. Do not change the topic.
- Do not add constraints, audiences, budgets or formats the user did not ask for.
- Make the request explicit about what kind of ideas are wanted.
- Reply with the rewritten request only: one short paragraph, no preamble, no quotes.";

/// System instruction for the generator, with persona tone and idea count.
pub fn generator_system(persona: &Persona, config: &RefineConfig) -> String {
    format!(
        "{discipline}\n\n\
         You are an idea generator. Produce between {min} and {max} distinct ideas \
         for the request you are given. Each idea must take a clearly different angle \
         from the others.\n\n\
         {tone}\n\n\
         Return a JSON array. Each element is an object with exactly two string fields:\n\
         - \"title\": a short, catchy name (under 10 words)\n\
         - \"description\": two or three paragraphs explaining the idea, \
         how it works and why it is interesting",
        discipline = OUTPUT_DISCIPLINE,
        min = config.ideas_min,
        max = config.ideas_max,
        tone = persona.tone.trim(),
    )
}

/// System instruction for the critic, with the persona's judging focus.
pub fn critic_system(persona: &Persona) -> String {
    format!(
        "{discipline}\n\n\
         You are a demanding critic reviewing a batch of generated ideas.\n\n\
         {focus}\n\n\
         Return a single JSON object with exactly these fields:\n\
         - \"ratings\": an array of integers 0-100, one per idea, in the same order \
         as the ideas were given\n\
         - \"feedback\": a concrete paragraph explaining what to keep and what to \
         improve, referring to ideas by title\n\
         - \"overallScore\": one of \"C\", \"B\", \"A\", \"A+\", \"A++\" \
         (C is worst, A++ is exceptional and rare)",
        discipline = OUTPUT_DISCIPLINE,
        focus = persona.critic_focus.trim(),
    )
}

/// User message for a generation pass.
///
/// On later passes `previous` carries the last iteration so the model keeps
/// the highly rated ideas and reworks the rest.
pub fn generation_message(
    prompt: &str,
    directions: &[String],
    previous: Option<&IterationRecord>,
    keep_rating_cutoff: u8,
) -> String {
    let mut message = format!("Request:\n{prompt}");

    if !directions.is_empty() {
        message.push_str(
            "\n\nCreative directions (use a different one as the angle for each idea):\n",
        );
        message.push_str(&super::directions::format_directions(directions));
    }

    if let Some(prev) = previous {
        message.push_str(&format!(
            "\n\n---\n\nPrevious round, with the critic's ratings:\n{ideas}\n\n\
             Critic feedback:\n{feedback}\n\n\
             Keep every idea rated {cutoff} or higher essentially unchanged. \
             Substantially rework or replace every idea rated below {cutoff}, \
             addressing the feedback.",
            ideas = render_ideas(&prev.rated_ideas(), true),
            feedback = prev.feedback,
            cutoff = keep_rating_cutoff,
        ));
    }

    message
}

/// User message for a critique pass.
pub fn critique_message(
    original_prompt: &str,
    enhanced_prompt: &str,
    ideas: &[Idea],
    previous_ideas: Option<&[Idea]>,
) -> String {
    let mut message = format!(
        "Original user request:\n{original_prompt}\n\n\
         Generation instruction:\n{enhanced_prompt}\n\n\
         Ideas to critique ({count}, rate them in this order):\n{ideas}",
        count = ideas.len(),
        ideas = render_ideas(ideas, false),
    );

    if let Some(prev) = previous_ideas {
        message.push_str(&format!(
            "\n\nFor comparison, the previous round's ideas with their ratings:\n{}\n\n\
             Rate the new batch on its own merits, but do not reward regressions.",
            render_ideas(prev, true)
        ));
    }

    message
}

/// Short stand-in for a critique request, used as the critic's prior turn.
pub fn critique_transcript_summary(iteration: usize, ideas: &[Idea]) -> String {
    let titles: Vec<&str> = ideas.iter().map(|i| i.title.as_str()).collect();
    format!(
        "Round {iteration}: critique these {} ideas: {}",
        ideas.len(),
        titles.join("; ")
    )
}

/// Base enhanced prompt plus the critic's latest feedback.
pub fn augmented_prompt(base: &str, feedback: Option<&str>) -> String {
    match feedback {
        Some(fb) if !fb.trim().is_empty() => format!(
            "{base}\n\nAddress this feedback from the previous round: {}",
            fb.trim()
        ),
        _ => base.to_string(),
    }
}

/// Pretty JSON listing of ideas, optionally with their ratings.
fn render_ideas(ideas: &[Idea], with_ratings: bool) -> String {
    let items: Vec<serde_json::Value> = ideas
        .iter()
        .enumerate()
        .map(|(i, idea)| {
            let mut item = json!({
                "index": i + 1,
                "title": idea.title,
                "description": idea.description,
            });
            if with_ratings {
                item["rating"] = json!(idea.rating);
            }
            item
        })
        .collect();
    serde_json::to_string_pretty(&items).unwrap_or_default()
}
