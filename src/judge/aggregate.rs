//! Combining several judge verdicts into one evaluation.

use serde_json::{json, Map, Value};

const PROVENANCE_KEYS: [&str; 3] = ["stage_1", "stage_2", "stage_3"];

/// Merge parsed verdicts into one evaluation object.
///
/// Criteria come from the first verdict, which also supplies each
/// criterion's other fields (such as `Analysis`). Each criterion's `Score`
/// becomes the mean of the numeric scores given for it across all verdicts,
/// and `total_score` is the sum of those means. Non-object entries are not
/// criteria and are ignored.
pub fn aggregate_verdicts(verdicts: &[Map<String, Value>]) -> Map<String, Value> {
    let mut evaluation = Map::new();
    let Some(first) = verdicts.first() else {
        evaluation.insert("total_score".to_string(), json!(0.0));
        return evaluation;
    };

    let mut total = 0.0;
    for (criterion, detail) in first {
        let Some(detail) = detail.as_object() else {
            continue;
        };

        let scores: Vec<f64> = verdicts
            .iter()
            .filter_map(|v| v.get(criterion)?.get("Score").and_then(score_value))
            .collect();
        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        total += mean;

        let mut merged = detail.clone();
        merged.insert("Score".to_string(), json!(mean));
        evaluation.insert(criterion.clone(), Value::Object(merged));
    }

    evaluation.insert("total_score".to_string(), json!(total));
    evaluation
}

/// Placeholder evaluation for a candidate no verdict could be parsed for:
/// every rubric criterion scores zero.
pub fn failed_evaluation(rubric: &Value) -> Map<String, Value> {
    let mut evaluation = Map::new();
    if let Some(criteria) = rubric.as_object() {
        for criterion in criteria.keys() {
            evaluation.insert(
                criterion.clone(),
                json!({"Score": 0, "Analysis": "Evaluation failed"}),
            );
        }
    }
    evaluation.insert("total_score".to_string(), json!(0));
    evaluation
}

/// Copy the candidate's per-stage transcripts into the evaluation.
pub fn attach_provenance(evaluation: &mut Map<String, Value>, candidate: &Value) {
    for key in PROVENANCE_KEYS {
        evaluation.insert(
            key.to_string(),
            candidate.get(key).cloned().unwrap_or(Value::Null),
        );
    }
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
