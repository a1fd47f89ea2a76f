//! Single-stage execution: prompt, complete, validate, retry.

use std::sync::Arc;

use super::prompts::{PromptBuilder, StageInput};
use super::stage::StageOutcome;
use crate::llm::TextCompleter;
use crate::metrics::MetricsCollector;
use crate::validation::StageValidator;

/// Runs one model-backed stage until its transcript passes validation or the
/// attempt budget is spent.
///
/// Attempts are retried immediately. An attempt that gets no text from the
/// completer counts the same as one whose text fails validation.
#[derive(Clone)]
pub struct StageRunner {
    completer: TextCompleter,
    validator: Arc<StageValidator>,
    prompts: Arc<dyn PromptBuilder>,
    stage_max_attempts: u32,
    request_max_attempts: u32,
    metrics: MetricsCollector,
}

impl StageRunner {
    pub fn new(
        completer: TextCompleter,
        validator: Arc<StageValidator>,
        prompts: Arc<dyn PromptBuilder>,
        stage_max_attempts: u32,
        request_max_attempts: u32,
    ) -> Self {
        Self {
            completer,
            validator,
            prompts,
            stage_max_attempts,
            request_max_attempts,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn stage_max_attempts(&self) -> u32 {
        self.stage_max_attempts
    }

    /// Run the stage described by `input` for the item at `item_index`.
    pub async fn run_stage(&self, input: &StageInput<'_>, item_index: u64) -> StageOutcome {
        let stage = input.kind();
        let mut last_text = None;

        for attempt in 1..=self.stage_max_attempts {
            let prompt = self.prompts.build(input);
            let response = self
                .completer
                .complete(&prompt, self.request_max_attempts)
                .await;

            let report = self.validator.inspect(stage, response.as_deref());
            self.metrics.record_stage_attempt(stage, report.is_valid());

            if report.is_valid() {
                if let Some(text) = response {
                    tracing::debug!(
                        index = item_index,
                        stage = %stage,
                        attempt = attempt,
                        length = report.length,
                        "Stage passed validation"
                    );
                    self.metrics.record_stage_outcome(stage, true);
                    return StageOutcome::passed(stage, attempt, text);
                }
            }

            tracing::debug!(
                index = item_index,
                stage = %stage,
                attempt = attempt,
                max_attempts = self.stage_max_attempts,
                reasons = %report.reasons(),
                "Stage attempt rejected"
            );
            last_text = response;
        }

        tracing::warn!(
            index = item_index,
            stage = %stage,
            attempts = self.stage_max_attempts,
            "Stage exhausted its attempts"
        );
        self.metrics.record_stage_outcome(stage, false);
        StageOutcome::exhausted(stage, self.stage_max_attempts, last_text)
    }
}
