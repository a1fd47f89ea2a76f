//! writeforge: staged long-form generation with validation gates.
//!
//! This library drives an LLM through a fixed plan, write and refine
//! sequence for large batches of queries, gates every stage on structural
//! validation, and persists each item's result as soon as it finishes. A
//! separate judge mode scores generated candidates with an LLM rubric.

// Core modules
pub mod cli;
pub mod error;
pub mod input;
pub mod judge;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod sink;
pub mod text;
pub mod validation;

// Re-export commonly used types
pub use error::{InputError, LlmError};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, PipelineResult, StageKind, WorkItem};
pub use scheduler::{BatchStatistics, Scheduler};
