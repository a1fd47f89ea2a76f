//! Background progress monitor for batch runs.
//!
//! Periodically logs how many items have finished, how many completed every
//! stage and how many are in flight, so long runs can be followed without
//! parsing per-item log lines.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

/// Snapshot of batch progress at a point in time.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Items whose result has been collected.
    pub completed: usize,
    /// Completed items that passed every stage.
    pub succeeded: usize,
    /// Completed items that stopped at a stage or hit an unexpected error.
    pub failed: usize,
    /// Items currently running a pipeline.
    pub in_flight: usize,
    pub elapsed: Duration,
}

/// Shared atomic counters, cloned into worker tasks.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounters {
    pub completed: Arc<AtomicUsize>,
    pub succeeded: Arc<AtomicUsize>,
    pub failed: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one collected item.
    pub fn record_completion(&self, succeeded: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, start: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            elapsed: start.elapsed(),
        }
    }
}

/// A background task that periodically logs batch progress.
///
/// Call [`ProgressMonitor::stop`] to cancel it.
pub struct ProgressMonitor {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Start logging every `interval` against a batch of `total` items.
    pub fn start(counters: ProgressCounters, total: usize, interval: Duration) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let flag = stop_flag.clone();
        let start = Instant::now();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.tick().await; // skip the immediate first tick

            loop {
                tick.tick().await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }

                let snap = counters.snapshot(start);
                let pct = if total > 0 {
                    (snap.completed as f64 / total as f64 * 100.0).min(100.0)
                } else {
                    0.0
                };
                let elapsed_secs = snap.elapsed.as_secs_f64();
                let items_per_sec = if elapsed_secs > 0.0 {
                    snap.completed as f64 / elapsed_secs
                } else {
                    0.0
                };

                tracing::info!(
                    completed = snap.completed,
                    succeeded = snap.succeeded,
                    failed = snap.failed,
                    in_flight = snap.in_flight,
                    total = total,
                    progress_pct = format!("{:.1}%", pct),
                    elapsed_secs = snap.elapsed.as_secs(),
                    items_per_sec = format!("{:.3}", items_per_sec),
                    "Batch progress"
                );
            }
        });

        Self {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Signal the monitor to stop and wait for it to finish.
    pub async fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let snap = ProgressCounters::new().snapshot(Instant::now());
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.succeeded, 0);
        assert_eq!(snap.failed, 0);
        assert_eq!(snap.in_flight, 0);
    }

    #[test]
    fn test_record_completion() {
        let counters = ProgressCounters::new();
        counters.record_completion(true);
        counters.record_completion(false);
        counters.record_completion(true);

        let snap = counters.snapshot(Instant::now());
        assert_eq!(snap.completed, 3);
        assert_eq!(snap.succeeded, 2);
        assert_eq!(snap.failed, 1);
    }

    #[test]
    fn test_clone_shares_state() {
        let counters = ProgressCounters::new();
        let clone = counters.clone();
        counters.in_flight.fetch_add(1, Ordering::Relaxed);
        assert_eq!(clone.in_flight.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_monitor_start_stop() {
        let counters = ProgressCounters::new();
        counters.record_completion(true);

        let monitor = ProgressMonitor::start(counters, 10, Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(120)).await;
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_monitor_stop_with_long_interval_returns_promptly() {
        let monitor = ProgressMonitor::start(ProgressCounters::new(), 1, Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(1), monitor.stop())
            .await
            .unwrap();
    }
}
