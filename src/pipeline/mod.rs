//! Staged document generation.
//!
//! Every work item moves through the same fixed stages:
//!
//! 1. **Plan**: brainstorm and outline the response to the user query
//! 2. **Write**: draft one reasoned paragraph per outline section
//! 3. **Refine**: revise the draft paragraph by paragraph
//! 4. **Final**: join the refined paragraphs into the finished document
//!
//! The first three stages call the model and must pass a structural
//! validation gate before the next stage may start. A stage retries up to
//! its attempt budget; an item whose stage exhausts the budget stops there
//! and is recorded with the stages it did complete.
//!
//! # Components
//!
//! - [`StageRunner`]: runs one stage (prompt, complete, validate, retry)
//! - [`PipelineOrchestrator`]: drives one item through the stage state machine
//! - [`PipelineConfig`]: budgets, endpoint, sampling and thresholds
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use writeforge::llm::CompletionClient;
//! use writeforge::pipeline::{PipelineConfig, PipelineOrchestrator, WorkItem};
//!
//! let config = PipelineConfig::from_env()?;
//! let client = CompletionClient::new(&config.endpoint_url, config.api_key.clone(), config.request_timeout)?;
//! let orchestrator = PipelineOrchestrator::from_config(Arc::new(client), &config);
//!
//! let result = orchestrator.run_item(&WorkItem::new(0, "Write a travel guide to Lisbon")).await;
//! if let Some(doc) = result.final_text {
//!     println!("{}", doc);
//! }
//! ```

pub mod config;
pub mod item;
pub mod orchestrator;
pub mod prompts;
pub mod runner;
pub mod stage;

pub use config::{ConfigError, PipelineConfig};
pub use item::{PipelineResult, WorkItem};
pub use orchestrator::PipelineOrchestrator;
pub use prompts::{compile_final, PromptBuilder, StageInput, StagedWritingPrompts, OUTLINE_SEPARATOR};
pub use runner::StageRunner;
pub use stage::{StageKind, StageOutcome};
