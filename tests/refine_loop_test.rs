// Integration tests for the refinement loop, driven by a scripted provider.
//
// Each test queues the exact model replies a run needs (enhancement, then a
// generate/critique pair per iteration) and asserts on the result and on the
// requests the loop actually sent.

use ideaforge::config::Persona;
use ideaforge::providers::{Role, ScriptedProvider};
use ideaforge::refine::prompts::ENHANCER_SYSTEM;
use ideaforge::refine::{
    Grade, RefineConfig, RefineError, RefineLoop, RunPhase, SelectionPolicy,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ENHANCED: &str = "Generate inventive, practical ideas about coffee.";

fn ideas_json(round: usize, count: usize) -> String {
    let ideas: Vec<_> = (1..=count)
        .map(|i| {
            json!({
                "title": format!("Round {round} idea {i}"),
                "description": format!("Description of idea {i} from round {round}."),
            })
        })
        .collect();
    serde_json::Value::Array(ideas).to_string()
}

fn critique_json(ratings: &[u8], grade: &str, feedback: &str) -> String {
    json!({
        "ratings": ratings,
        "feedback": feedback,
        "overallScore": grade,
    })
    .to_string()
}

fn config(min: usize, max: usize) -> RefineConfig {
    RefineConfig {
        min_iterations: min,
        max_iterations: max,
        improvement_threshold: 0.02,
        ..Default::default()
    }
}

fn refine_loop(provider: &Arc<ScriptedProvider>, config: RefineConfig) -> RefineLoop {
    RefineLoop::new(provider.clone(), Persona::default(), config).expect("valid loop")
}

// ---------------------------------------------------------------------------
// Stopping rule and selection
// ---------------------------------------------------------------------------

/// A perfect first round still runs the minimum number of iterations, and
/// the best (first) round is what gets reported.
#[tokio::test]
async fn test_minimum_iterations_enforced_and_best_kept() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 3),
        critique_json(&[95, 96, 97], "A++", "Outstanding set."),
        ideas_json(2, 3),
        critique_json(&[80, 80, 80], "A", "Weaker than before."),
    ]));

    let result = refine_loop(&provider, config(2, 5))
        .run("ideas about coffee")
        .await
        .expect("run succeeds");

    assert_eq!(result.iteration_count, 2);
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.best_score, Grade::APlusPlus);
    assert_eq!(result.feedback, "Outstanding set.");
    assert_eq!(result.ideas[0].title, "Round 1 idea 1");
    assert_eq!(
        result.ideas.iter().map(|i| i.rating).collect::<Vec<_>>(),
        vec![95, 96, 97]
    );
    assert_eq!(result.original_prompt, "ideas about coffee");
    assert!(!result.improvement_threshold_met);
    assert_eq!(provider.call_count(), 5);
    assert_eq!(provider.remaining(), 0);
}

/// 80 → 80.5 is a 0.625% gain, under the 2% threshold: stop after round 2.
#[tokio::test]
async fn test_stops_when_improvement_below_threshold() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        critique_json(&[80, 80], "A", "Solid."),
        ideas_json(2, 2),
        critique_json(&[80, 81], "A", "Marginally better."),
        ideas_json(3, 2),
        critique_json(&[99, 99], "A++", "Never reached."),
    ]));

    let result = refine_loop(&provider, config(2, 5))
        .run("ideas about coffee")
        .await
        .unwrap();

    assert_eq!(result.iteration_count, 2);
    // same grade, higher average: round 2 wins
    assert_eq!(result.feedback, "Marginally better.");
    assert_eq!(result.ideas[1].rating, 81);
    assert!(!result.improvement_threshold_met);
    assert_eq!(provider.remaining(), 2);
}

/// Keeps going while each round improves by at least the threshold.
#[tokio::test]
async fn test_continues_while_improving() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        critique_json(&[60, 60], "B", "Too generic."),
        ideas_json(2, 2),
        critique_json(&[70, 70], "B", "Better."),
        ideas_json(3, 2),
        critique_json(&[70, 70], "B", "No change."),
    ]));

    let result = refine_loop(&provider, config(2, 5))
        .run("ideas about coffee")
        .await
        .unwrap();

    assert_eq!(result.iteration_count, 3);
    // round 2 and 3 tie; the earlier one stays best
    assert_eq!(result.feedback, "Better.");
    assert_eq!(provider.remaining(), 0);
}

/// The iteration cap wins even while ratings keep climbing.
#[tokio::test]
async fn test_max_iterations_caps_the_loop() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 1),
        critique_json(&[50], "C", "Weak."),
        ideas_json(2, 1),
        critique_json(&[60], "B", "Better."),
        ideas_json(3, 1),
        critique_json(&[70], "A", "Good."),
        ideas_json(4, 1),
        critique_json(&[80], "A+", "Unused."),
    ]));

    let result = refine_loop(&provider, config(2, 3))
        .run("ideas about coffee")
        .await
        .unwrap();

    assert_eq!(result.iteration_count, 3);
    assert_eq!(result.best_score, Grade::A);
    assert!(result.improvement_threshold_met);
    assert_eq!(provider.remaining(), 2);
}

#[tokio::test]
async fn test_latest_selection_reports_final_round() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 1),
        critique_json(&[95], "A++", "Great."),
        ideas_json(2, 1),
        critique_json(&[40], "C", "Regressed."),
    ]));
    let cfg = RefineConfig {
        selection: SelectionPolicy::Latest,
        ..config(2, 2)
    };

    let result = refine_loop(&provider, cfg).run("coffee").await.unwrap();

    assert_eq!(result.best_score, Grade::C);
    assert_eq!(result.feedback, "Regressed.");
    assert_eq!(result.ideas[0].title, "Round 2 idea 1");
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_empty_prompt_makes_no_model_call() {
    let provider = Arc::new(ScriptedProvider::new());
    let phases = Mutex::new(Vec::new());

    let err = refine_loop(&provider, config(2, 5))
        .run_observed("   \n\t", &|p| phases.lock().unwrap().push(p))
        .await
        .unwrap_err();

    assert!(matches!(err, RefineError::UserInput(_)));
    assert_eq!(provider.call_count(), 0);
    assert!(phases.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_prompt_rejected() {
    let provider = Arc::new(ScriptedProvider::new());
    let cfg = RefineConfig {
        max_prompt_chars: 10,
        ..config(1, 1)
    };
    let err = refine_loop(&provider, cfg)
        .run("this prompt is far too long")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "user_input");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_generation_without_json_fails_run() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED,
        "Sure, here are some ideas: not json",
    ]));
    let phases = Mutex::new(Vec::new());

    let err = refine_loop(&provider, config(2, 5))
        .run_observed("ideas about coffee", &|p| phases.lock().unwrap().push(p))
        .await
        .unwrap_err();

    assert!(matches!(err, RefineError::GenerationParse(_)));
    assert_eq!(provider.call_count(), 2);
    let phases = phases.into_inner().unwrap();
    assert_eq!(phases.last(), Some(&RunPhase::Failed));
    assert!(!phases.contains(&RunPhase::Done));
}

#[tokio::test]
async fn test_generation_object_instead_of_array_fails() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED,
        r#"{"title": "One idea", "description": "Not wrapped in a list"}"#,
    ]));
    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert_eq!(err.kind(), "generation_parse");
}

#[tokio::test]
async fn test_empty_enhancement_fails_run() {
    let provider = Arc::new(ScriptedProvider::with_replies(["  \n  "]));
    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert!(matches!(err, RefineError::Enhancement(_)));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_enhancement_provider_error_is_enhancement_failure() {
    let provider = Arc::new(ScriptedProvider::new());
    provider.push_error("503 Service Unavailable");
    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert_eq!(err.kind(), "enhancement_failure");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_critique_provider_error_fails_run() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
    ]));
    provider.push_error("429 Too Many Requests");

    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert!(matches!(err, RefineError::Provider(ref m) if m.contains("429")));
}

#[tokio::test]
async fn test_critique_without_json_is_parse_error() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        "These are all great, A+ overall.".to_string(),
    ]));
    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert_eq!(err.kind(), "critique_parse");
}

#[tokio::test]
async fn test_critique_with_unknown_grade_is_validation_error() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        critique_json(&[80, 80], "A+++", "Fine."),
    ]));
    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert!(matches!(err, RefineError::CritiqueValidation(ref m) if m.contains("overallScore")));
}

#[tokio::test]
async fn test_critique_rating_count_mismatch_is_validation_error() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 3),
        critique_json(&[80, 80], "A", "Only rated two."),
    ]));
    let err = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap_err();
    assert!(matches!(err, RefineError::CritiqueValidation(ref m) if m.contains("2 ratings for 3 ideas")));
}

// ---------------------------------------------------------------------------
// What the loop sends and reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_phase_sequence_for_single_iteration() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        critique_json(&[70, 75], "B", "Okay."),
    ]));
    let phases = Mutex::new(Vec::new());

    refine_loop(&provider, config(1, 1))
        .run_observed("coffee", &|p| phases.lock().unwrap().push(p))
        .await
        .unwrap();

    assert_eq!(
        phases.into_inner().unwrap(),
        vec![
            RunPhase::Enhancing,
            RunPhase::Generating { iteration: 1 },
            RunPhase::Critiquing { iteration: 1 },
            RunPhase::Deciding { iteration: 1 },
            RunPhase::Finalizing,
            RunPhase::Done,
        ]
    );
}

#[tokio::test]
async fn test_requests_carry_feedback_and_critic_continuity() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        critique_json(&[60, 92], "B", "Idea one is too vague."),
        ideas_json(2, 2),
        critique_json(&[60, 92], "B", "Same again."),
    ]));
    let cfg = config(2, 2);
    let result = refine_loop(&provider, cfg.clone()).run("coffee").await.unwrap();
    let requests = provider.requests();
    assert_eq!(requests.len(), 5);

    // enhancement
    assert_eq!(requests[0].system, ENHANCER_SYSTEM);
    assert_eq!(requests[0].message, "coffee");
    assert_eq!(requests[0].settings, cfg.enhance);

    // first generation has no history; second carries ratings and feedback
    assert_eq!(requests[1].settings, cfg.generate);
    assert!(requests[1].message.contains(ENHANCED));
    assert!(!requests[1].message.contains("Previous round"));
    assert!(requests[3].message.contains("Previous round"));
    assert!(requests[3].message.contains("Idea one is too vague."));
    assert!(requests[3].message.contains("\"rating\": 92"));

    // critic: fresh on round 1, replays its previous exchange on round 2
    assert_eq!(requests[2].settings, cfg.critique);
    assert!(requests[2].turns.is_empty());
    assert_eq!(requests[4].turns.len(), 2);
    assert_eq!(requests[4].turns[0].role, Role::User);
    assert_eq!(requests[4].turns[1].role, Role::Assistant);
    assert!(requests[4].turns[1].content.contains("Idea one is too vague."));

    // the reported prompt is the one used for the last generation
    assert!(result.enhanced_prompt.starts_with(ENHANCED));
    assert!(result.enhanced_prompt.contains("Idea one is too vague."));
}

#[tokio::test]
async fn test_fenced_and_prose_wrapped_replies_are_accepted() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        format!("\"{ENHANCED}\""),
        format!("Here are your ideas:\n```json\n{}\n```\nEnjoy!", ideas_json(1, 2)),
        format!("My verdict: {} Hope that helps.", critique_json(&[77, 88], "A", "Nice.")),
    ]));
    let result = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap();
    assert_eq!(result.ideas.len(), 2);
    assert_eq!(result.history[0].ratings, vec![77, 88]);
    // wrapping quotes are stripped from the enhanced prompt
    assert_eq!(result.enhanced_prompt, ENHANCED);
}

#[tokio::test]
async fn test_float_ratings_are_rounded() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        r#"{"ratings": [79.6, 80.4], "feedback": "ok", "overallScore": "A"}"#.to_string(),
    ]));
    let result = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap();
    assert_eq!(result.history[0].ratings, vec![80, 80]);
}

#[tokio::test]
async fn test_result_serializes_for_the_ui() {
    let provider = Arc::new(ScriptedProvider::with_replies([
        ENHANCED.to_string(),
        ideas_json(1, 2),
        critique_json(&[90, 91], "A+", "Strong."),
    ]));
    let result = refine_loop(&provider, config(1, 1)).run("coffee").await.unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["originalPrompt"], "coffee");
    assert_eq!(value["iterationCount"], 1);
    assert_eq!(value["bestScore"], "A+");
    assert_eq!(value["ideas"][1]["rating"], 91);
    assert_eq!(value["history"][0]["score"], "A+");
    assert_eq!(value["history"][0]["ideas"][1]["rating"], 0);

    let back: ideaforge::refine::ConversationResult = serde_json::from_value(value).unwrap();
    assert_eq!(back, result);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let provider = Arc::new(ScriptedProvider::new());
    let err = RefineLoop::new(provider, Persona::default(), config(4, 2))
        .err()
        .expect("max below min must be rejected");
    assert_eq!(err.kind(), "config");
}
