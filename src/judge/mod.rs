//! LLM-as-judge scoring of generated candidates.
//!
//! A judge run walks a folder of JSON documents, each holding a `query`, a
//! list of generated candidates under `final_result` and an optional rubric
//! under `evaluate_standard`. Every candidate without an entry in the result
//! field is scored several times; the parsed verdicts are averaged and
//! written back into the document through the sharded updater.

pub mod aggregate;
pub mod config;
pub mod prompt;
pub mod runner;
pub mod task;

use thiserror::Error;

use crate::sink::SinkError;

pub use aggregate::{aggregate_verdicts, attach_provenance, failed_evaluation};
pub use config::JudgeConfig;
pub use prompt::{JudgePromptBuilder, RubricPrompt};
pub use runner::{JudgeOutcome, JudgeRunner};
pub use task::{discover_pending, JudgeTask};

/// Errors that can stop a judge run before scoring begins.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Data folder not found: {0}")]
    FolderNotFound(String),

    #[error("Failed to list documents: {0}")]
    Walk(String),

    #[error("Invalid judge configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write evaluations: {0}")]
    Sink(#[from] SinkError),
}

/// Counts reported at the end of a judge run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct JudgeSummary {
    /// Unscored candidates found.
    pub pending: usize,
    pub processed: usize,
    /// Candidates with at least one parsable verdict.
    pub succeeded: usize,
    pub failed: usize,
    pub documents_written: usize,
    pub failed_updates: usize,
}
