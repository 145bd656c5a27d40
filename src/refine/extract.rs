// Response extraction: pull a JSON value out of free-form model text
//
// Models are asked for bare JSON but regularly wrap it in prose or markdown
// fences. Strategies are tried in order; the first candidate that parses
// strictly wins. Nothing partial is ever returned.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Greedy span from the first opening bracket to the last closing one
static GREEDY_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)[\[{].*[\]}]").expect("valid regex"));

/// Fenced block explicitly labelled as JSON
static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json\s*(.*?)```").expect("valid regex"));

/// Any fenced block
static ANY_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*\s*(.*?)```").expect("valid regex"));

/// Upper bound on bracket positions tried by the balanced scan
const MAX_BALANCED_STARTS: usize = 64;

/// No strategy produced parseable JSON
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("model response was empty")]
    Empty,

    #[error("no JSON found in model response (starts with: {preview:?})")]
    NoJson { preview: String },
}

/// Extract the first JSON array or object from `raw`.
///
/// Order: greedy bracket span, ```json fence, any fence, then a balanced
/// bracket scan as a last resort.
pub fn extract_json(raw: &str) -> Result<Value, ExtractionError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let strategies: [(&str, fn(&str) -> Option<Value>); 4] = [
        ("greedy_span", greedy_span),
        ("json_fence", |t| fenced(&JSON_FENCE, t)),
        ("any_fence", |t| fenced(&ANY_FENCE, t)),
        ("balanced_scan", balanced_scan),
    ];

    for (name, strategy) in strategies {
        if let Some(value) = strategy(text) {
            tracing::debug!(strategy = name, "Extracted JSON from model response");
            return Ok(value);
        }
    }

    Err(ExtractionError::NoJson {
        preview: text.chars().take(80).collect(),
    })
}

fn greedy_span(text: &str) -> Option<Value> {
    GREEDY_SPAN
        .find(text)
        .and_then(|m| parse_candidate(m.as_str()))
}

fn fenced(pattern: &Regex, text: &str) -> Option<Value> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_candidate(m.as_str()))
}

/// Try every opening bracket, matching it to its balanced close.
fn balanced_scan(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|&(_, c)| c == '[' || c == '{')
        .take(MAX_BALANCED_STARTS)
        .filter_map(|(start, _)| balanced_end(text, start).map(|end| &text[start..end]))
        .find_map(parse_candidate)
}

/// Byte index just past the bracket closing the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip fences and whitespace, then parse strictly. Only arrays and objects count.
fn parse_candidate(candidate: &str) -> Option<Value> {
    let cleaned = strip_markdown_fences(candidate);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ (Value::Array(_) | Value::Object(_))) => Some(value),
        _ => None,
    }
}

/// Strip leading/trailing markdown code fences (```json ... ``` or ``` ... ```)
fn strip_markdown_fences(s: &str) -> &str {
    let s = s.trim();
    let s = if let Some(rest) = s.strip_prefix("```json") {
        rest
    } else if let Some(rest) = s.strip_prefix("```") {
        rest
    } else {
        s
    };
    if let Some(rest) = s.strip_suffix("```") {
        rest.trim()
    } else {
        s.trim()
    }
}
