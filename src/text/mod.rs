//! Text utilities shared by the generation and judging pipelines.
//!
//! - [`sections`]: marker-delimited section extraction (`<answer>..</answer>`)
//! - [`length`]: the mixed-script length measure used by stage validation
//! - [`json_block`]: fenced JSON extraction from judge responses

pub mod json_block;
pub mod length;
pub mod sections;

pub use json_block::{extract_json_block, find_matching_brace, strip_reasoning};
pub use length::length_units;
pub use sections::{count_sections, extract_sections, SectionMarkers, SectionScanner, ANSWER, THINK};
