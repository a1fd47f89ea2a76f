//! Judge run configuration.

use std::time::Duration;

use super::JudgeError;
use crate::llm::SamplingParams;

/// Settings for scoring candidates with an LLM judge.
#[derive(Debug, Clone)]
pub struct JudgeConfig {
    /// Parsable verdicts collected per candidate before aggregating.
    pub required_verdicts: usize,
    /// Completions requested per candidate while collecting verdicts.
    pub max_attempts: u32,
    /// Requests per completion before it counts as no response.
    pub request_max_attempts: u32,
    /// Candidates evaluated at once.
    pub max_concurrent: usize,
    /// Document field the evaluations are written into.
    pub result_field: String,
    pub flush_batch_size: usize,
    pub flush_interval: Duration,
    pub sampling: SamplingParams,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            required_verdicts: 3,
            max_attempts: 5,
            request_max_attempts: 5,
            max_concurrent: 64,
            result_field: "evaluate_result".to_string(),
            flush_batch_size: 10,
            flush_interval: Duration::from_secs(5),
            sampling: SamplingParams {
                max_tokens: 8192,
                seed: None,
                stop: vec!["<|user|>".to_string(), "<|endoftext|>".to_string()],
                ..SamplingParams::default()
            },
        }
    }
}

impl JudgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_required_verdicts(mut self, verdicts: usize) -> Self {
        self.required_verdicts = verdicts;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_request_max_attempts(mut self, attempts: u32) -> Self {
        self.request_max_attempts = attempts;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.sampling.model = model.into();
        self
    }

    pub fn validate(&self) -> Result<(), JudgeError> {
        if self.required_verdicts == 0 {
            return Err(JudgeError::InvalidConfig(
                "required_verdicts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 || self.request_max_attempts == 0 {
            return Err(JudgeError::InvalidConfig(
                "attempt budgets must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent == 0 {
            return Err(JudgeError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.result_field.is_empty() {
            return Err(JudgeError::InvalidConfig(
                "result_field cannot be empty".to_string(),
            ));
        }
        if self.flush_batch_size == 0 || self.flush_interval.is_zero() {
            return Err(JudgeError::InvalidConfig(
                "flush batch size and interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JudgeConfig::default();
        assert_eq!(config.required_verdicts, 3);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.max_concurrent, 64);
        assert_eq!(config.result_field, "evaluate_result");
        assert_eq!(config.flush_batch_size, 10);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert_eq!(config.sampling.max_tokens, 8192);
        assert!(config.sampling.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(JudgeConfig::new().with_required_verdicts(0).validate().is_err());
        assert!(JudgeConfig::new().with_max_attempts(0).validate().is_err());
        assert!(JudgeConfig::new().with_max_concurrent(0).validate().is_err());
        assert!(JudgeConfig::new()
            .with_flush_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
