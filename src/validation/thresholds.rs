//! Per-stage acceptance bounds.

use crate::pipeline::StageKind;

/// An inclusive range of allowed section counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRange {
    pub min: usize,
    pub max: usize,
}

impl SectionRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub const fn exactly(count: usize) -> Self {
        Self {
            min: count,
            max: count,
        }
    }

    pub fn contains(&self, count: usize) -> bool {
        self.min <= count && count <= self.max
    }
}

/// Bounds a transcript must satisfy to pass one stage's gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageThresholds {
    /// Exclusive lower bound on length units.
    pub min_length: usize,
    /// Exclusive upper bound on length units.
    pub max_length: usize,
    pub answers: SectionRange,
    pub thinks: SectionRange,
    /// Require as many think sections as answer sections.
    pub balanced: bool,
}

impl StageThresholds {
    /// Plan: an outline split into exactly two answers.
    pub fn plan() -> Self {
        Self {
            min_length: 500,
            max_length: 32_000,
            answers: SectionRange::exactly(2),
            thinks: SectionRange::new(1, 2),
            balanced: false,
        }
    }

    /// Write: one reasoned answer per outlined part.
    pub fn write() -> Self {
        Self {
            min_length: 1_000,
            max_length: 32_000,
            answers: SectionRange::new(4, 16),
            thinks: SectionRange::new(4, 16),
            balanced: true,
        }
    }

    /// Refine shares the write bounds.
    pub fn refine() -> Self {
        Self::write()
    }

    fn check(&self, label: &str) -> Result<(), String> {
        if self.min_length >= self.max_length {
            return Err(format!(
                "{} min_length ({}) must be less than max_length ({})",
                label, self.min_length, self.max_length
            ));
        }
        if self.answers.min > self.answers.max {
            return Err(format!("{} answer range is empty", label));
        }
        if self.thinks.min > self.thinks.max {
            return Err(format!("{} think range is empty", label));
        }
        Ok(())
    }
}

/// Thresholds for every gated stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationThresholds {
    pub plan: StageThresholds,
    pub write: StageThresholds,
    pub refine: StageThresholds,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            plan: StageThresholds::plan(),
            write: StageThresholds::write(),
            refine: StageThresholds::refine(),
        }
    }
}

impl ValidationThresholds {
    /// Thresholds for `stage`, or `None` for the ungated final stage.
    pub fn for_stage(&self, stage: StageKind) -> Option<&StageThresholds> {
        match stage {
            StageKind::Plan => Some(&self.plan),
            StageKind::Write => Some(&self.write),
            StageKind::Refine => Some(&self.refine),
            StageKind::Final => None,
        }
    }

    /// Check that every stage's bounds describe a non-empty region.
    pub fn check(&self) -> Result<(), String> {
        self.plan.check("plan")?;
        self.write.check("write")?;
        self.refine.check("refine")
    }
}
