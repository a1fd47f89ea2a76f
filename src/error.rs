//! Error types for writeforge operations.
//!
//! Defines errors for the subsystems that can fail during setup or I/O:
//! - LLM endpoint interactions
//! - Input loading
//!
//! Configuration, sink and judge errors live next to their modules.
//! Retry loops never surface these to callers; a stage that exhausts its
//! attempts is reported as a failed outcome, not as an error.

use thiserror::Error;

/// Errors that can occur during a single LLM request.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("LLM response contained no choices")]
    EmptyResponse,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur while loading work items.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input file not found: {0}")]
    NotFound(String),

    #[error("Line {line}: invalid JSON: {message}")]
    MalformedLine { line: usize, message: String },

    #[error("Line {line}: missing or empty query")]
    MissingQuery { line: usize },

    #[error("Line {line}: index {index} already used on line {first_line}")]
    DuplicateIndex {
        line: usize,
        index: u64,
        first_line: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
