//! Work items and their per-item pipeline results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stage::{StageKind, StageOutcome};

/// One unit of work: a query to turn into a finished document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique within a batch.
    pub index: u64,
    pub query: String,
}

impl WorkItem {
    pub fn new(index: u64, query: impl Into<String>) -> Self {
        Self {
            index,
            query: query.into(),
        }
    }
}

/// The persisted record of one item's trip through the pipeline.
///
/// `stage_results` always carries all four stages and is monotonic: a stage
/// can only be `true` if every earlier stage is `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub index: u64,
    pub query: String,
    pub stage_results: BTreeMap<StageKind, bool>,
    /// The compiled document; present only when every stage passed.
    pub final_text: Option<String>,
    /// The last validated stage transcript when a later stage failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<StageKind>,
    /// Attempts spent in each model-backed stage (0 if never reached).
    pub attempt_counts: BTreeMap<StageKind, u32>,
    /// Set when the item was failed by an unexpected error rather than a gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    /// Assemble a result from the outcomes of the stages that ran, in order.
    pub fn from_outcomes(
        item: &WorkItem,
        outcomes: &[StageOutcome],
        final_text: Option<String>,
    ) -> Self {
        let mut stage_results: BTreeMap<StageKind, bool> =
            StageKind::ALL.iter().map(|s| (*s, false)).collect();
        let mut attempt_counts: BTreeMap<StageKind, u32> =
            StageKind::GATED.iter().map(|s| (*s, 0)).collect();

        let mut partial_text = None;
        let mut failed_stage = None;

        for outcome in outcomes {
            attempt_counts.insert(outcome.stage, outcome.attempts_used);
            if outcome.success {
                stage_results.insert(outcome.stage, true);
                partial_text = outcome.raw_text.clone();
            } else {
                failed_stage = Some(outcome.stage);
                break;
            }
        }

        if final_text.is_some() {
            stage_results.insert(StageKind::Final, true);
            partial_text = None;
        }

        Self {
            index: item.index,
            query: item.query.clone(),
            stage_results,
            final_text,
            partial_text,
            failed_stage,
            attempt_counts,
            error: None,
        }
    }

    /// A result with every stage failed, for items lost to unexpected errors.
    pub fn unexpected_failure(item: &WorkItem, error: impl Into<String>) -> Self {
        let mut result = Self::from_outcomes(item, &[], None);
        result.error = Some(error.into());
        result
    }

    pub fn passed(&self, stage: StageKind) -> bool {
        self.stage_results.get(&stage).copied().unwrap_or(false)
    }

    pub fn attempts(&self, stage: StageKind) -> u32 {
        self.attempt_counts.get(&stage).copied().unwrap_or(0)
    }

    /// Whether the item made it all the way through.
    pub fn is_complete(&self) -> bool {
        self.passed(StageKind::Final)
    }

    /// Check that no stage passed after an earlier one failed.
    pub fn is_monotonic(&self) -> bool {
        let mut seen_failure = false;
        for stage in StageKind::ALL {
            let passed = self.passed(stage);
            if passed && seen_failure {
                return false;
            }
            seen_failure |= !passed;
        }
        true
    }
}
