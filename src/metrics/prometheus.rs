//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by writeforge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all writeforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Stage attempts, labeled by stage and validation verdict (passed/rejected).
pub static STAGE_ATTEMPTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Stage outcomes, labeled by stage and status (success/exhausted).
pub static STAGE_OUTCOMES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Completed work items, labeled by status (done/failed/error).
pub static ITEMS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Work items whose pipeline is currently running.
pub static ITEMS_IN_FLIGHT: OnceLock<Gauge> = OnceLock::new();

/// LLM requests, labeled by status (success/failure).
pub static LLM_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// LLM request latency in seconds.
pub static LLM_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Serializes initialization so the statics always come from one registry.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Calling this more than once is a no-op after the first success.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric construction or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let stage_attempts_total = CounterVec::new(
        Opts::new(
            "writeforge_stage_attempts_total",
            "Stage attempts by validation verdict",
        ),
        &["stage", "verdict"],
    )?;

    let stage_outcomes_total = CounterVec::new(
        Opts::new("writeforge_stage_outcomes_total", "Final stage outcomes"),
        &["stage", "status"],
    )?;

    let items_total = CounterVec::new(
        Opts::new("writeforge_items_total", "Completed work items"),
        &["status"],
    )?;

    let items_in_flight = Gauge::new(
        "writeforge_items_in_flight",
        "Work items whose pipeline is running",
    )?;

    let llm_requests_total = CounterVec::new(
        Opts::new("writeforge_llm_requests_total", "Total LLM API requests"),
        &["status"],
    )?;

    let llm_latency = Histogram::with_opts(
        HistogramOpts::new(
            "writeforge_llm_latency_seconds",
            "LLM API request latency in seconds",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
    )?;

    registry.register(Box::new(stage_attempts_total.clone()))?;
    registry.register(Box::new(stage_outcomes_total.clone()))?;
    registry.register(Box::new(items_total.clone()))?;
    registry.register(Box::new(items_in_flight.clone()))?;
    registry.register(Box::new(llm_requests_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;

    let _ = REGISTRY.set(registry);
    let _ = STAGE_ATTEMPTS_TOTAL.set(stage_attempts_total);
    let _ = STAGE_OUTCOMES_TOTAL.set(stage_outcomes_total);
    let _ = ITEMS_TOTAL.set(items_total);
    let _ = ITEMS_IN_FLIGHT.set(items_in_flight);
    let _ = LLM_REQUESTS_TOTAL.set(llm_requests_total);
    let _ = LLM_LATENCY.set(llm_latency);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, the returned
/// text is a single comment line describing the problem.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(REGISTRY.get().is_some());
    }

    #[test]
    fn test_export_after_recording() {
        let _ = init_metrics();
        if let Some(items) = ITEMS_TOTAL.get() {
            items.with_label_values(&["done"]).inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("writeforge_items_total"));
    }
}
