//! Incremental result persistence.
//!
//! Two writers are provided:
//!
//! - [`JsonlSink`]: append-only JSON Lines output for pipeline results. Every
//!   result is on disk as soon as its batch fills (one result by default), so a
//!   crash keeps everything finished before it.
//! - [`ShardedUpdater`]: read-modify-write updates into many shared JSON
//!   documents, batched by count or time, with one lock per document path
//!   from a [`FileLockRegistry`].

pub mod jsonl;
pub mod sharded;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::PipelineResult;

pub use jsonl::{recorded_indices, recorded_results, JsonlSink, SinkTotals};
pub use sharded::{
    DocumentUpdate, FileLockRegistry, ShardedUpdater, ShardedUpdaterConfig, UpdateSender,
    UpdaterTotals,
};

/// Errors that can occur while persisting results.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to read or write to the filesystem.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize a record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A document did not have the expected JSON shape.
    #[error("Invalid document {path}: {message}")]
    InvalidDocument { path: String, message: String },

    /// The writer has already shut down.
    #[error("Writer is closed")]
    Closed,

    /// The background flush worker stopped abnormally.
    #[error("Flush worker failed: {0}")]
    WorkerFailed(String),
}

/// Destination for finished pipeline results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist one result. Safe to call from many tasks at once.
    async fn save(&self, result: &PipelineResult) -> Result<(), SinkError>;

    /// Write anything still buffered and report totals.
    async fn finalize(&self) -> Result<SinkTotals, SinkError>;
}
