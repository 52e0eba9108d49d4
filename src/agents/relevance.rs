//! Parsing of the researcher agent's relevance scores.
//!
//! The model is asked for a JSON object mapping document names to numeric scores. Anything else
//! (prose, arrays, names that match no document, non-numeric scores) selects the first document
//! in upload order and reports every document with a zero score.

use crate::processing::ScoredDocument;
use serde_json::Value;
use std::cmp::Ordering;

/// Outcome of scoring a question against the stored summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceSelection {
    /// Chunk chosen as answer context.
    pub selected: String,
    /// Score of every document considered, highest first.
    pub scores: Vec<ScoredDocument>,
    /// Whether the response was unusable and the first document was chosen.
    pub fallback: bool,
}

impl RelevanceSelection {
    /// Score of the selected document.
    pub fn selected_score(&self) -> f64 {
        self.scores
            .iter()
            .find(|scored| scored.document == self.selected)
            .map(|scored| scored.score)
            .unwrap_or(0.0)
    }
}

/// Parse the model response against the known chunk names (in upload order).
///
/// Returns `None` only when `known` is empty.
pub fn parse_relevance(response: &str, known: &[String]) -> Option<RelevanceSelection> {
    let first = known.first()?;
    match parse_scores(response, known) {
        Some(mut scores) => {
            // Stable sort keeps upload order among equal scores, so ties go to the earlier upload.
            scores.sort_by(|left, right| {
                right
                    .score
                    .partial_cmp(&left.score)
                    .unwrap_or(Ordering::Equal)
            });
            Some(RelevanceSelection {
                selected: scores[0].document.clone(),
                scores,
                fallback: false,
            })
        }
        None => {
            tracing::warn!(
                documents = known.len(),
                "Could not parse relevance scores; falling back to first document"
            );
            Some(RelevanceSelection {
                selected: first.clone(),
                scores: known
                    .iter()
                    .map(|name| ScoredDocument {
                        document: name.clone(),
                        score: 0.0,
                    })
                    .collect(),
                fallback: true,
            })
        }
    }
}

/// Scores for known documents in upload order, or `None` when nothing usable was returned.
fn parse_scores(response: &str, known: &[String]) -> Option<Vec<ScoredDocument>> {
    let value: Value = serde_json::from_str(strip_code_fence(response)).ok()?;
    let object = value.as_object()?;

    let scores: Vec<ScoredDocument> = known
        .iter()
        .filter_map(|name| {
            let score = object.get(name).and_then(numeric_score)?;
            Some(ScoredDocument {
                document: name.clone(),
                score,
            })
        })
        .collect();

    if scores.is_empty() { None } else { Some(scores) }
}

fn numeric_score(value: &Value) -> Option<f64> {
    let score = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }?;
    score.is_finite().then_some(score)
}

/// Models often wrap JSON in a Markdown fence; accept the fenced body.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
