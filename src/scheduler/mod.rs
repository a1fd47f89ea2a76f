//! Concurrent batch execution with statistics and progress reporting.
//!
//! - **Scheduler**: fans a batch of work items out to tokio tasks under a
//!   semaphore, persists each result as it finishes, and aggregates
//!   statistics in completion order
//! - **BatchStatistics**: per-stage success counts and attempt totals
//! - **ProgressMonitor**: periodic progress logging while a batch runs
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  Work items  │
//!                 └──────┬───────┘
//!                        │ one task per item
//!        ┌───────────────┼───────────────┐
//!        ▼               ▼               ▼
//!   ┌─────────┐     ┌─────────┐     ┌─────────┐
//!   │ Item 1  │     │ Item 2  │ ... │ Item N  │   at most `limit` hold a permit
//!   └────┬────┘     └────┬────┘     └────┬────┘
//!        │ save          │ save          │ save
//!        ▼               ▼               ▼
//!   ┌────────────────────────────────────────┐
//!   │              Result sink               │
//!   └────────────────────────────────────────┘
//!        │ completion order
//!        ▼
//!   ┌──────────────────┐
//!   │ BatchStatistics  │   updated by the collecting loop only
//!   └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use writeforge::scheduler::Scheduler;
//! use writeforge::sink::{JsonlSink, ResultSink};
//!
//! let sink = Arc::new(JsonlSink::create("out.jsonl", 1).await?);
//! let scheduler = Scheduler::new(orchestrator, sink.clone(), 64);
//! let stats = scheduler.run_batch(items).await;
//! sink.finalize().await?;
//! ```

pub mod batch;
pub mod progress;
pub mod stats;

pub use batch::Scheduler;
pub use progress::{ProgressCounters, ProgressMonitor, ProgressSnapshot};
pub use stats::{stats_path_for, write_stats_file, BatchStatistics, StatsSummary};
