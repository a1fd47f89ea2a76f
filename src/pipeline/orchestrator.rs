//! Per-item pipeline orchestration.
//!
//! An item moves through an explicit state machine:
//!
//! ```text
//! Start -> Plan -> Write -> Refine -> Final -> Done
//!            \        \        \
//!             `--------`--------`--> Failed(stage)
//! ```
//!
//! Each model-backed state runs one stage to completion. A passing stage
//! hands its answer sections to the next state; a failing stage is terminal.
//! Final is a deterministic join of the refine stage's answers and cannot fail.

use std::sync::Arc;

use super::config::PipelineConfig;
use super::item::{PipelineResult, WorkItem};
use super::prompts::{compile_final, PromptBuilder, StageInput, StagedWritingPrompts};
use super::runner::StageRunner;
use super::stage::{StageKind, StageOutcome};
use crate::llm::{LlmProvider, TextCompleter};
use crate::text::{extract_sections, ANSWER};
use crate::validation::StageValidator;

/// Where an item currently is in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    Start,
    Plan,
    /// Carries the validated plan's answer sections.
    Write(Vec<String>),
    /// Carries the validated draft's answer sections.
    Refine(Vec<String>),
    /// Carries the validated refinement's answer sections.
    Final(Vec<String>),
    Done(String),
    Failed(StageKind),
}

/// Drives a single work item through every stage and reports the result.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    runner: StageRunner,
}

impl PipelineOrchestrator {
    pub fn new(runner: StageRunner) -> Self {
        Self { runner }
    }

    /// Build an orchestrator from configuration, using the default prompts.
    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &PipelineConfig) -> Self {
        Self::with_prompts(provider, config, Arc::new(StagedWritingPrompts))
    }

    /// Build an orchestrator from configuration with custom prompts.
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        config: &PipelineConfig,
        prompts: Arc<dyn PromptBuilder>,
    ) -> Self {
        let completer = TextCompleter::new(provider, config.sampling_params());
        let validator = Arc::new(StageValidator::new(config.thresholds.clone()));
        Self::new(StageRunner::new(
            completer,
            validator,
            prompts,
            config.stage_max_attempts,
            config.request_max_attempts,
        ))
    }

    /// Run `item` through the pipeline. Never fails: stage failures are
    /// recorded in the returned result.
    pub async fn run_item(&self, item: &WorkItem) -> PipelineResult {
        let mut outcomes: Vec<StageOutcome> = Vec::with_capacity(StageKind::GATED.len());
        let mut state = PipelineState::Start;

        loop {
            state = match state {
                PipelineState::Start => PipelineState::Plan,
                PipelineState::Plan => {
                    let input = StageInput::Plan { query: &item.query };
                    self.advance(&input, item, &mut outcomes, PipelineState::Write)
                        .await
                }
                PipelineState::Write(outline) => {
                    let input = StageInput::Write { outline: &outline };
                    self.advance(&input, item, &mut outcomes, PipelineState::Refine)
                        .await
                }
                PipelineState::Refine(draft) => {
                    let input = StageInput::Refine { draft: &draft };
                    self.advance(&input, item, &mut outcomes, PipelineState::Final)
                        .await
                }
                PipelineState::Final(refined) => PipelineState::Done(compile_final(&refined)),
                PipelineState::Done(text) => {
                    tracing::debug!(index = item.index, "Item completed all stages");
                    return PipelineResult::from_outcomes(item, &outcomes, Some(text));
                }
                PipelineState::Failed(stage) => {
                    tracing::info!(index = item.index, stage = %stage, "Item failed");
                    return PipelineResult::from_outcomes(item, &outcomes, None);
                }
            };
        }
    }

    /// Run one stage and pick the next state from its outcome.
    async fn advance(
        &self,
        input: &StageInput<'_>,
        item: &WorkItem,
        outcomes: &mut Vec<StageOutcome>,
        on_success: fn(Vec<String>) -> PipelineState,
    ) -> PipelineState {
        let outcome = self.runner.run_stage(input, item.index).await;
        let next = match (outcome.success, outcome.raw_text.as_deref()) {
            (true, Some(text)) => on_success(extract_sections(text, ANSWER)),
            _ => PipelineState::Failed(outcome.stage),
        };
        outcomes.push(outcome);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationRequest, GenerationResponse, Message, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Answers by stage header so the same mock serves every stage.
    struct StageAwareProvider {
        plan: Option<String>,
        write: Option<String>,
        refine: Option<String>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicU32,
    }

    impl StageAwareProvider {
        fn new(plan: Option<String>, write: Option<String>, refine: Option<String>) -> Self {
            Self {
                plan,
                write,
                refine,
                prompts: Mutex::new(Vec::new()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for StageAwareProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = request.messages[0].content.clone();
            let reply = if prompt.starts_with("Superwrite-Stage-1") {
                self.plan.clone()
            } else if prompt.starts_with("Superwrite-Stage-2") {
                self.write.clone()
            } else {
                self.refine.clone()
            };
            self.prompts.lock().unwrap().push(prompt);
            let content = reply.ok_or_else(|| LlmError::RequestFailed("down".to_string()))?;
            Ok(GenerationResponse {
                id: "mock".to_string(),
                model: "mock".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: None,
                }],
                usage: Usage::default(),
            })
        }
    }

    fn sections(prefix: &str, count: usize, filler: usize) -> String {
        let mut text = String::new();
        for i in 0..count {
            text.push_str(&format!(
                "<think>{}</think><answer>{} {}</answer>",
                "reason ".repeat(filler),
                prefix,
                i
            ));
        }
        text
    }

    fn plan_text() -> String {
        format!(
            "<think>{}</think><answer>outline A</answer><answer>outline B</answer>",
            "plan ".repeat(600)
        )
    }

    fn config(stage_attempts: u32) -> PipelineConfig {
        PipelineConfig::default()
            .with_stage_max_attempts(stage_attempts)
            .with_request_max_attempts(1)
    }

    #[tokio::test]
    async fn test_full_pipeline_success() {
        let provider = Arc::new(StageAwareProvider::new(
            Some(plan_text()),
            Some(sections("draft", 4, 300)),
            Some(sections("final", 4, 300)),
        ));
        let orchestrator = PipelineOrchestrator::from_config(provider.clone(), &config(3));
        let result = orchestrator.run_item(&WorkItem::new(1, "a query")).await;

        assert!(result.is_complete());
        assert!(result.is_monotonic());
        assert_eq!(
            result.final_text.as_deref(),
            Some("final 0\nfinal 1\nfinal 2\nfinal 3")
        );
        for stage in StageKind::GATED {
            assert_eq!(result.attempts(stage), 1);
        }

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("a query"));
        assert!(prompts[1].contains("outline A\n### Outline:outline B"));
        assert!(prompts[2].contains("draft 0\ndraft 1\ndraft 2\ndraft 3"));
    }

    #[tokio::test]
    async fn test_plan_failure_stops_pipeline() {
        let provider = Arc::new(StageAwareProvider::new(None, Some(sections("d", 4, 300)), None));
        let orchestrator = PipelineOrchestrator::from_config(provider.clone(), &config(4));
        let result = orchestrator.run_item(&WorkItem::new(2, "q")).await;

        assert!(!result.passed(StageKind::Plan));
        assert_eq!(result.failed_stage, Some(StageKind::Plan));
        assert_eq!(result.attempts(StageKind::Plan), 4);
        assert_eq!(result.attempts(StageKind::Write), 0);
        assert!(result.final_text.is_none());
        assert!(result.is_monotonic());

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p.starts_with("Superwrite-Stage-1")));
    }

    #[tokio::test]
    async fn test_write_failure_keeps_plan() {
        // 4 answers but 5 thinks is unbalanced
        let unbalanced = format!("{}<think>extra</think>", sections("d", 4, 300));
        let provider = Arc::new(StageAwareProvider::new(Some(plan_text()), Some(unbalanced), None));
        let orchestrator = PipelineOrchestrator::from_config(provider, &config(2));
        let result = orchestrator.run_item(&WorkItem::new(3, "q")).await;

        assert!(result.passed(StageKind::Plan));
        assert!(!result.passed(StageKind::Write));
        assert!(!result.passed(StageKind::Refine));
        assert!(!result.passed(StageKind::Final));
        assert_eq!(result.failed_stage, Some(StageKind::Write));
        assert_eq!(result.partial_text, Some(plan_text()));
        assert_eq!(result.attempts(StageKind::Plan), 1);
        assert_eq!(result.attempts(StageKind::Write), 2);
    }

    #[tokio::test]
    async fn test_refine_failure() {
        let provider = Arc::new(StageAwareProvider::new(
            Some(plan_text()),
            Some(sections("d", 4, 300)),
            Some("refusal".to_string()),
        ));
        let orchestrator = PipelineOrchestrator::from_config(provider, &config(2));
        let result = orchestrator.run_item(&WorkItem::new(4, "q")).await;

        assert!(result.passed(StageKind::Write));
        assert!(!result.passed(StageKind::Refine));
        assert_eq!(result.failed_stage, Some(StageKind::Refine));
        assert!(result.is_monotonic());
    }
}
