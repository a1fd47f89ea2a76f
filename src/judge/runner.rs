//! Concurrent candidate scoring.

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::aggregate::{aggregate_verdicts, attach_provenance, failed_evaluation};
use super::config::JudgeConfig;
use super::prompt::{JudgePromptBuilder, RubricPrompt};
use super::task::{discover_pending, JudgeTask};
use super::{JudgeError, JudgeSummary};
use crate::llm::{LlmProvider, TextCompleter};
use crate::sink::{DocumentUpdate, FileLockRegistry, ShardedUpdater, ShardedUpdaterConfig};
use crate::text::{extract_json_block, strip_reasoning};

/// The evaluation produced for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeOutcome {
    pub evaluation: Value,
    /// Whether at least one verdict could be parsed.
    pub succeeded: bool,
    pub verdicts: usize,
    pub attempts: u32,
}

/// Scores candidates by polling the judge model for several verdicts each.
#[derive(Clone)]
pub struct JudgeRunner {
    completer: TextCompleter,
    prompts: Arc<dyn JudgePromptBuilder>,
    config: JudgeConfig,
}

impl JudgeRunner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: JudgeConfig) -> Self {
        Self::with_prompts(provider, config, Arc::new(RubricPrompt))
    }

    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        config: JudgeConfig,
        prompts: Arc<dyn JudgePromptBuilder>,
    ) -> Self {
        Self {
            completer: TextCompleter::new(provider, config.sampling.clone()),
            prompts,
            config,
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Collect up to `required_verdicts` parsable verdicts within
    /// `max_attempts` completions and merge them.
    pub async fn evaluate(&self, task: &JudgeTask) -> JudgeOutcome {
        let prompt = self.prompts.build(task);
        let mut verdicts = Vec::with_capacity(self.config.required_verdicts);
        let mut attempts = 0;

        while attempts < self.config.max_attempts && verdicts.len() < self.config.required_verdicts {
            attempts += 1;
            let Some(reply) = self
                .completer
                .complete(&prompt, self.config.request_max_attempts)
                .await
            else {
                continue;
            };

            match extract_json_block(strip_reasoning(&reply)) {
                Some(Value::Object(verdict)) => verdicts.push(verdict),
                _ => tracing::debug!(
                    path = %task.path.display(),
                    candidate = task.candidate_index,
                    attempt = attempts,
                    "Judge reply had no parsable verdict"
                ),
            }
        }

        let succeeded = !verdicts.is_empty();
        let mut evaluation = if succeeded {
            aggregate_verdicts(&verdicts)
        } else {
            tracing::warn!(
                path = %task.path.display(),
                candidate = task.candidate_index,
                attempts = attempts,
                "No judge verdict could be parsed"
            );
            failed_evaluation(&task.rubric)
        };
        attach_provenance(&mut evaluation, &task.candidate);

        JudgeOutcome {
            evaluation: Value::Object(evaluation),
            succeeded,
            verdicts: verdicts.len(),
            attempts,
        }
    }

    /// Score every pending candidate under `folder` and write the
    /// evaluations back into their documents.
    pub async fn run_folder(&self, folder: &Path) -> Result<JudgeSummary, JudgeError> {
        self.config.validate()?;
        let tasks = discover_pending(folder, &self.config.result_field).await?;
        let mut summary = JudgeSummary {
            pending: tasks.len(),
            ..Default::default()
        };
        if tasks.is_empty() {
            return Ok(summary);
        }

        let updater = ShardedUpdater::spawn(
            ShardedUpdaterConfig {
                field: self.config.result_field.clone(),
                batch_size: self.config.flush_batch_size,
                flush_interval: self.config.flush_interval,
            },
            Arc::new(FileLockRegistry::new()),
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));

        let mut pending = FuturesUnordered::new();
        for task in tasks {
            let runner = self.clone();
            let semaphore = semaphore.clone();
            let sender = updater.sender();
            let key = (task.path.clone(), task.candidate_index);

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let outcome = runner.evaluate(&task).await;
                let update =
                    DocumentUpdate::new(&task.path, task.result_key(), outcome.evaluation);
                if let Err(e) = sender.submit(update).await {
                    tracing::error!(path = %task.path.display(), error = %e, "Failed to queue evaluation");
                    return None;
                }
                Some(outcome.succeeded)
            });
            pending.push(async move { (key, handle.await) });
        }

        while let Some(((path, candidate), joined)) = pending.next().await {
            summary.processed += 1;
            match joined {
                Ok(Some(true)) => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        candidate = candidate,
                        error = %e,
                        "Judge task ended unexpectedly"
                    );
                    summary.failed += 1;
                }
            }
        }

        let totals = updater.close().await?;
        summary.documents_written = totals.documents_written;
        summary.failed_updates = totals.failed_updates;

        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Judge run finished"
        );
        Ok(summary)
    }
}
