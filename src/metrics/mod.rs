//! Metrics module for Prometheus-based monitoring.
//!
//! Records stage attempts, stage outcomes, item completions and LLM request
//! latency. The CLI writes the text exposition to `--metrics-file` when asked.
//!
//! # Example
//!
//! ```ignore
//! use writeforge::metrics::{init_metrics, export_metrics, MetricsCollector};
//! use writeforge::pipeline::StageKind;
//!
//! init_metrics()?;
//! let collector = MetricsCollector::new();
//! collector.record_stage_attempt(StageKind::Plan, true);
//! let text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    ITEMS_IN_FLIGHT, ITEMS_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL, REGISTRY, STAGE_ATTEMPTS_TOTAL,
    STAGE_OUTCOMES_TOTAL,
};
