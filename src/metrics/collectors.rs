//! High-level recording interface over the raw Prometheus metrics.
//!
//! Every method is a no-op when [`init_metrics`](super::init_metrics) has not
//! been called, so library code can record unconditionally.

use super::prometheus::{
    ITEMS_IN_FLIGHT, ITEMS_TOTAL, LLM_LATENCY, LLM_REQUESTS_TOTAL, STAGE_ATTEMPTS_TOTAL,
    STAGE_OUTCOMES_TOTAL,
};
use crate::pipeline::StageKind;

/// Metrics collector for recording writeforge operational metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one stage attempt and whether its transcript passed validation.
    pub fn record_stage_attempt(&self, stage: StageKind, passed: bool) {
        let verdict = if passed { "passed" } else { "rejected" };

        if let Some(attempts) = STAGE_ATTEMPTS_TOTAL.get() {
            attempts.with_label_values(&[stage.as_str(), verdict]).inc();
        }

        tracing::trace!(stage = %stage, verdict = verdict, "Recorded stage attempt metric");
    }

    /// Record how a stage ended.
    pub fn record_stage_outcome(&self, stage: StageKind, success: bool) {
        let status = if success { "success" } else { "exhausted" };

        if let Some(outcomes) = STAGE_OUTCOMES_TOTAL.get() {
            outcomes.with_label_values(&[stage.as_str(), status]).inc();
        }

        tracing::trace!(stage = %stage, status = status, "Recorded stage outcome metric");
    }

    /// Record a finished work item ("done", "failed" or "error").
    pub fn record_item(&self, status: &str) {
        if let Some(items) = ITEMS_TOTAL.get() {
            items.with_label_values(&[status]).inc();
        }

        tracing::trace!(status = status, "Recorded item metric");
    }

    /// Record one LLM request.
    pub fn record_llm_request(&self, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(requests) = LLM_REQUESTS_TOTAL.get() {
            requests.with_label_values(&[status]).inc();
        }

        if let Some(latency) = LLM_LATENCY.get() {
            latency.observe(latency_secs);
        }

        tracing::trace!(
            status = status,
            latency_secs = latency_secs,
            "Recorded LLM request metric"
        );
    }

    pub fn inc_items_in_flight(&self) {
        if let Some(in_flight) = ITEMS_IN_FLIGHT.get() {
            in_flight.inc();
        }
    }

    pub fn dec_items_in_flight(&self) {
        if let Some(in_flight) = ITEMS_IN_FLIGHT.get() {
            in_flight.dec();
        }
    }
}
