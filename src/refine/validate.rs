// Critique validation: the shape contract for critic output
//
// A critique is only accepted when every check passes. Rejection is final for
// the run; nothing here retries or repairs.

use serde_json::Value;

use super::types::{CritiqueResult, Grade};

/// Pure predicate: does `parsed` satisfy the critique shape contract?
pub fn is_valid_critique(parsed: &Value) -> bool {
    check_critique(parsed).is_ok()
}

/// Check the critique shape and convert it, or explain the first violation.
///
/// Ratings may arrive as floats; they are rounded once they pass the range check.
pub fn check_critique(parsed: &Value) -> Result<CritiqueResult, String> {
    let obj = parsed
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {}", type_name(parsed)))?;

    let ratings = obj
        .get("ratings")
        .ok_or("missing 'ratings'")?
        .as_array()
        .ok_or("'ratings' is not an array")?;
    if ratings.is_empty() {
        return Err("'ratings' is empty".to_string());
    }
    let ratings = ratings
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let n = r
                .as_f64()
                .filter(|n| n.is_finite())
                .ok_or_else(|| format!("rating #{} is not a number", i + 1))?;
            if !(0.0..=100.0).contains(&n) {
                return Err(format!("rating #{} ({n}) is outside 0-100", i + 1));
            }
            Ok(n.round() as u8)
        })
        .collect::<Result<Vec<u8>, String>>()?;

    let feedback = obj
        .get("feedback")
        .ok_or("missing 'feedback'")?
        .as_str()
        .ok_or("'feedback' is not a string")?;
    if feedback.trim().is_empty() {
        return Err("'feedback' is empty".to_string());
    }

    let overall_score = obj
        .get("overallScore")
        .ok_or("missing 'overallScore'")?
        .as_str()
        .ok_or("'overallScore' is not a string")?
        .trim()
        .parse::<Grade>()
        .map_err(|e| format!("'overallScore' {e}"))?;

    Ok(CritiqueResult {
        ratings,
        feedback: feedback.trim().to_string(),
        overall_score,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
