//! Bounded-concurrency batch execution.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::progress::{ProgressCounters, ProgressMonitor};
use super::stats::BatchStatistics;
use crate::metrics::MetricsCollector;
use crate::pipeline::{PipelineOrchestrator, PipelineResult, WorkItem};
use crate::sink::ResultSink;

/// Marks an item as in flight for as long as it lives, including through a
/// panic in the pipeline.
struct InFlightGuard {
    counters: ProgressCounters,
    metrics: MetricsCollector,
}

impl InFlightGuard {
    fn enter(counters: ProgressCounters, metrics: MetricsCollector) -> Self {
        counters.in_flight.fetch_add(1, Ordering::Relaxed);
        metrics.inc_items_in_flight();
        Self { counters, metrics }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.metrics.dec_items_in_flight();
    }
}

/// Runs many independent items through the pipeline at once.
///
/// One task is spawned per item and a semaphore caps how many run
/// concurrently. Each task persists its own result the moment it finishes.
/// Results are collected in completion order and folded into the
/// statistics by the collecting loop alone.
pub struct Scheduler {
    orchestrator: PipelineOrchestrator,
    sink: Arc<dyn ResultSink>,
    concurrency_limit: usize,
    progress_interval: Duration,
    metrics: MetricsCollector,
}

impl Scheduler {
    pub fn new(
        orchestrator: PipelineOrchestrator,
        sink: Arc<dyn ResultSink>,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            orchestrator,
            sink,
            concurrency_limit: concurrency_limit.max(1),
            progress_interval: Duration::from_secs(30),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Run every item and return the batch statistics.
    ///
    /// Never fails: stage failures are part of each item's result, and an
    /// item whose task dies unexpectedly is recorded (and persisted) as a
    /// fully-failed result.
    pub async fn run_batch(&self, items: Vec<WorkItem>) -> BatchStatistics {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let counters = ProgressCounters::new();
        let monitor = ProgressMonitor::start(counters.clone(), total, self.progress_interval);

        tracing::info!(
            items = total,
            concurrency = self.concurrency_limit,
            "Starting batch"
        );

        let mut pending = FuturesUnordered::new();
        for item in items {
            let semaphore = semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let sink = self.sink.clone();
            let counters = counters.clone();
            let metrics = self.metrics;
            let task_item = item.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return PipelineResult::unexpected_failure(
                            &task_item,
                            "scheduler semaphore closed",
                        )
                    }
                };
                let _in_flight = InFlightGuard::enter(counters, metrics);

                let result = orchestrator.run_item(&task_item).await;
                if let Err(e) = sink.save(&result).await {
                    tracing::error!(index = result.index, error = %e, "Failed to persist result");
                }
                result
            });

            pending.push(async move { (item, handle.await) });
        }

        let mut stats = BatchStatistics::new();
        while let Some((item, joined)) = pending.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        index = item.index,
                        error = %e,
                        "Pipeline task ended unexpectedly"
                    );
                    let result = PipelineResult::unexpected_failure(&item, e.to_string());
                    if let Err(e) = self.sink.save(&result).await {
                        tracing::error!(index = item.index, error = %e, "Failed to persist result");
                    }
                    result
                }
            };

            let status = if result.error.is_some() {
                "error"
            } else if result.is_complete() {
                "done"
            } else {
                "failed"
            };
            self.metrics.record_item(status);
            counters.record_completion(result.is_complete());
            stats.record(&result);
        }

        monitor.stop().await;

        tracing::info!(
            total = stats.total,
            unexpected_errors = stats.unexpected_errors,
            "Batch finished"
        );
        stats
    }
}
