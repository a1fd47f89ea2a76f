//! Stage identifiers and per-stage outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed stages a work item moves through, in pipeline order.
///
/// The derived ordering follows declaration order, so `Plan < Write < Refine < Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Plan,
    Write,
    Refine,
    Final,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [StageKind; 4] = [
        StageKind::Plan,
        StageKind::Write,
        StageKind::Refine,
        StageKind::Final,
    ];

    /// Stages that call the model and pass through a validation gate.
    pub const GATED: [StageKind; 3] = [StageKind::Plan, StageKind::Write, StageKind::Refine];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Plan => "plan",
            StageKind::Write => "write",
            StageKind::Refine => "refine",
            StageKind::Final => "final",
        }
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<StageKind> {
        match self {
            StageKind::Plan => Some(StageKind::Write),
            StageKind::Write => Some(StageKind::Refine),
            StageKind::Refine => Some(StageKind::Final),
            StageKind::Final => None,
        }
    }

    /// Whether this stage calls the model and is gated by validation.
    pub fn is_gated(&self) -> bool {
        !matches!(self, StageKind::Final)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running one stage to completion or exhaustion.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: StageKind,
    pub success: bool,
    pub attempts_used: u32,
    /// The validated transcript on success. On failure, the last attempt's
    /// text (if any), kept for diagnostics.
    pub raw_text: Option<String>,
}

impl StageOutcome {
    pub fn passed(stage: StageKind, attempts_used: u32, text: String) -> Self {
        Self {
            stage,
            success: true,
            attempts_used,
            raw_text: Some(text),
        }
    }

    pub fn exhausted(stage: StageKind, attempts_used: u32, last_text: Option<String>) -> Self {
        Self {
            stage,
            success: false,
            attempts_used,
            raw_text: last_text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(StageKind::Plan < StageKind::Write);
        assert!(StageKind::Write < StageKind::Refine);
        assert!(StageKind::Refine < StageKind::Final);
        let mut shuffled = vec![StageKind::Final, StageKind::Plan, StageKind::Refine, StageKind::Write];
        shuffled.sort();
        assert_eq!(shuffled, StageKind::ALL.to_vec());
    }

    #[test]
    fn test_next_walks_the_pipeline() {
        let mut stage = StageKind::Plan;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, StageKind::ALL.to_vec());
    }

    #[test]
    fn test_display_and_serde_agree() {
        for stage in StageKind::ALL {
            let json = serde_json::to_string(&stage).expect("serialize");
            assert_eq!(json, format!("\"{}\"", stage));
        }
        let parsed: StageKind = serde_json::from_str("\"refine\"").expect("deserialize");
        assert_eq!(parsed, StageKind::Refine);
    }

    #[test]
    fn test_only_final_is_ungated() {
        assert!(StageKind::GATED.iter().all(|s| s.is_gated()));
        assert!(!StageKind::Final.is_gated());
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = StageOutcome::passed(StageKind::Write, 3, "text".to_string());
        assert!(ok.success);
        assert_eq!(ok.attempts_used, 3);
        assert_eq!(ok.raw_text.as_deref(), Some("text"));

        let failed = StageOutcome::exhausted(StageKind::Plan, 10, None);
        assert!(!failed.success);
        assert_eq!(failed.attempts_used, 10);
        assert!(failed.raw_text.is_none());
    }
}
