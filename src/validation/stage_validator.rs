//! The per-stage validation gate.

use thiserror::Error;

use super::thresholds::ValidationThresholds;
use crate::pipeline::StageKind;
use crate::text::{count_sections, length_units, ANSWER, THINK};

/// One reason a transcript was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("no response")]
    Missing,

    #[error("length {length} is not above {min}")]
    TooShort { length: usize, min: usize },

    #[error("length {length} is not below {max}")]
    TooLong { length: usize, max: usize },

    #[error("{found} answer sections, expected {min}..={max}")]
    AnswerCount { found: usize, min: usize, max: usize },

    #[error("{found} think sections, expected {min}..={max}")]
    ThinkCount { found: usize, min: usize, max: usize },

    #[error("{answers} answer sections but {thinks} think sections")]
    Unbalanced { answers: usize, thinks: usize },
}

/// Measurements taken from a transcript plus every bound it violated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub length: usize,
    pub answers: usize,
    pub thinks: usize,
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures joined for a single log field.
    pub fn reasons(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Pure gate deciding whether a stage transcript may advance the pipeline.
#[derive(Debug, Clone, Default)]
pub struct StageValidator {
    thresholds: ValidationThresholds,
}

impl StageValidator {
    pub fn new(thresholds: ValidationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ValidationThresholds {
        &self.thresholds
    }

    /// Measure `response` against the bounds for `stage`.
    ///
    /// The final stage has no gate; any present text passes it.
    pub fn inspect(&self, stage: StageKind, response: Option<&str>) -> ValidationReport {
        let Some(text) = response else {
            return ValidationReport {
                failures: vec![ValidationFailure::Missing],
                ..ValidationReport::default()
            };
        };

        let mut report = ValidationReport {
            length: length_units(text),
            answers: count_sections(text, ANSWER),
            thinks: count_sections(text, THINK),
            failures: Vec::new(),
        };

        let Some(bounds) = self.thresholds.for_stage(stage) else {
            return report;
        };

        if report.length <= bounds.min_length {
            report.failures.push(ValidationFailure::TooShort {
                length: report.length,
                min: bounds.min_length,
            });
        }
        if report.length >= bounds.max_length {
            report.failures.push(ValidationFailure::TooLong {
                length: report.length,
                max: bounds.max_length,
            });
        }
        if !bounds.answers.contains(report.answers) {
            report.failures.push(ValidationFailure::AnswerCount {
                found: report.answers,
                min: bounds.answers.min,
                max: bounds.answers.max,
            });
        }
        if !bounds.thinks.contains(report.thinks) {
            report.failures.push(ValidationFailure::ThinkCount {
                found: report.thinks,
                min: bounds.thinks.min,
                max: bounds.thinks.max,
            });
        }
        if bounds.balanced && report.answers != report.thinks {
            report.failures.push(ValidationFailure::Unbalanced {
                answers: report.answers,
                thinks: report.thinks,
            });
        }

        report
    }

    /// Whether `response` passes the gate for `stage`.
    pub fn validate(&self, stage: StageKind, response: Option<&str>) -> bool {
        self.inspect(stage, response).is_valid()
    }
}
