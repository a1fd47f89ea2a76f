//! Structural validation gates for stage transcripts.
//!
//! Every model-backed stage must produce a transcript whose length and
//! section structure fall inside configured bounds before the pipeline moves
//! on. Validation is pure: the same transcript always gets the same verdict.
//!
//! ```
//! use writeforge::pipeline::StageKind;
//! use writeforge::validation::{StageValidator, ValidationThresholds};
//!
//! let validator = StageValidator::new(ValidationThresholds::default());
//! assert!(!validator.validate(StageKind::Plan, None));
//! assert!(!validator.validate(StageKind::Plan, Some("too short")));
//! ```

pub mod stage_validator;
pub mod thresholds;

pub use stage_validator::{StageValidator, ValidationFailure, ValidationReport};
pub use thresholds::{SectionRange, StageThresholds, ValidationThresholds};
