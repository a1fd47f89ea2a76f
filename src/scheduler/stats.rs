//! Batch-level statistics and the persisted summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::pipeline::{PipelineResult, StageKind};
use crate::sink::SinkError;

/// Running per-stage tallies for one batch.
///
/// Owned by the scheduler's collecting loop and updated once per finished
/// item, so it needs no synchronization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchStatistics {
    /// Items seen, including rejected input records.
    pub total: usize,
    pub stage_successes: BTreeMap<StageKind, usize>,
    pub stage_attempts: BTreeMap<StageKind, u64>,
    /// Items lost to panics or other task failures.
    pub unexpected_errors: usize,
    /// Input records rejected before reaching the pipeline.
    pub malformed_records: usize,
}

impl BatchStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished item into the tallies.
    pub fn record(&mut self, result: &PipelineResult) {
        self.total += 1;

        for stage in StageKind::ALL {
            if result.passed(stage) {
                *self.stage_successes.entry(stage).or_insert(0) += 1;
            }
        }
        for stage in StageKind::GATED {
            *self.stage_attempts.entry(stage).or_insert(0) += u64::from(result.attempts(stage));
        }

        if result.error.is_some() {
            self.unexpected_errors += 1;
        }
    }

    /// Tallies over results persisted by an earlier run.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a PipelineResult>) -> Self {
        let mut stats = Self::new();
        for result in results {
            stats.record(result);
        }
        stats
    }

    /// Add the tallies of `other`, e.g. the records a resumed run kept.
    pub fn merge(&mut self, other: &BatchStatistics) {
        self.total += other.total;
        for (stage, count) in &other.stage_successes {
            *self.stage_successes.entry(*stage).or_insert(0) += count;
        }
        for (stage, attempts) in &other.stage_attempts {
            *self.stage_attempts.entry(*stage).or_insert(0) += attempts;
        }
        self.unexpected_errors += other.unexpected_errors;
        self.malformed_records += other.malformed_records;
    }

    /// Count input records that were rejected while loading.
    pub fn record_malformed(&mut self, count: usize) {
        self.total += count;
        self.malformed_records += count;
    }

    pub fn successes(&self, stage: StageKind) -> usize {
        self.stage_successes.get(&stage).copied().unwrap_or(0)
    }

    /// Percentage of all items that passed `stage`.
    pub fn success_rate(&self, stage: StageKind) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successes(stage) as f64 / self.total as f64 * 100.0
    }

    /// Mean attempts spent on `stage` across all items.
    ///
    /// Items that never reached the stage contribute zero attempts.
    pub fn average_attempts(&self, stage: StageKind) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let attempts = self.stage_attempts.get(&stage).copied().unwrap_or(0);
        attempts as f64 / self.total as f64
    }

    pub fn summary(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> StatsSummary {
        StatsSummary {
            run_id,
            started_at,
            finished_at,
            total: self.total,
            plan_success: self.successes(StageKind::Plan),
            write_success: self.successes(StageKind::Write),
            refine_success: self.successes(StageKind::Refine),
            final_success: self.successes(StageKind::Final),
            plan_success_rate: self.success_rate(StageKind::Plan),
            write_success_rate: self.success_rate(StageKind::Write),
            refine_success_rate: self.success_rate(StageKind::Refine),
            final_success_rate: self.success_rate(StageKind::Final),
            avg_plan_attempts: self.average_attempts(StageKind::Plan),
            avg_write_attempts: self.average_attempts(StageKind::Write),
            avg_refine_attempts: self.average_attempts(StageKind::Refine),
            unexpected_errors: self.unexpected_errors,
            malformed_records: self.malformed_records,
        }
    }
}

/// Flat, serializable form of [`BatchStatistics`] for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub plan_success: usize,
    pub write_success: usize,
    pub refine_success: usize,
    pub final_success: usize,
    pub plan_success_rate: f64,
    pub write_success_rate: f64,
    pub refine_success_rate: f64,
    pub final_success_rate: f64,
    pub avg_plan_attempts: f64,
    pub avg_write_attempts: f64,
    pub avg_refine_attempts: f64,
    pub unexpected_errors: usize,
    pub malformed_records: usize,
}

impl StatsSummary {
    /// Human-readable multi-line report.
    pub fn render(&self) -> String {
        let rows = [
            ("Plan", self.plan_success, self.plan_success_rate),
            ("Write", self.write_success, self.write_success_rate),
            ("Refine", self.refine_success, self.refine_success_rate),
            ("Final", self.final_success, self.final_success_rate),
        ];

        let mut out = String::from("Stage success rates:\n");
        for (name, count, rate) in rows {
            out.push_str(&format!(
                "  {:<7} {}/{} ({:.2}%)\n",
                name, count, self.total, rate
            ));
        }
        out.push_str("Average attempts:\n");
        out.push_str(&format!("  Plan    {:.2}\n", self.avg_plan_attempts));
        out.push_str(&format!("  Write   {:.2}\n", self.avg_write_attempts));
        out.push_str(&format!("  Refine  {:.2}\n", self.avg_refine_attempts));
        if self.unexpected_errors > 0 || self.malformed_records > 0 {
            out.push_str(&format!(
                "Unexpected errors: {}, malformed records: {}\n",
                self.unexpected_errors, self.malformed_records
            ));
        }
        out
    }
}

/// `<dir>/<stem>_stats.json` next to the output file.
pub fn stats_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{}_stats.json", stem))
}

pub async fn write_stats_file(path: &Path, summary: &StatsSummary) -> Result<(), SinkError> {
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
