//! Pipeline configuration.
//!
//! This module provides configuration for the generation pipeline: the
//! concurrency and retry budgets, the completion endpoint and its sampling
//! parameters, result persistence, and the per-stage validation thresholds.

use std::time::Duration;
use thiserror::Error;

use crate::llm::{default_stop_sequences, SamplingParams};
use crate::validation::ValidationThresholds;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Execution settings
    /// Maximum number of items whose pipelines run at once.
    pub max_concurrent_items: usize,
    /// Attempts per stage before the item fails at that stage.
    pub stage_max_attempts: u32,
    /// Requests per completion before the attempt counts as no response.
    pub request_max_attempts: u32,
    /// Timeout for each completion request.
    pub request_timeout: Duration,

    // Endpoint settings
    /// Full chat-completions URL.
    pub endpoint_url: String,
    /// Optional bearer token for the endpoint.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub seed: Option<u64>,
    pub stop_sequences: Vec<String>,

    // Output settings
    /// Results buffered before the sink writes them out.
    pub sink_batch_size: usize,
    /// How often the progress monitor logs.
    pub progress_interval: Duration,

    // Validation settings
    pub thresholds: ValidationThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_items: 64,
            stage_max_attempts: 10,
            request_max_attempts: 2,
            request_timeout: Duration::from_secs(1200),

            endpoint_url: "http://localhost:8000/v1/chat/completions".to_string(),
            api_key: None,
            model: "default".to_string(),
            temperature: 0.6,
            top_p: 0.95,
            max_tokens: 32_768,
            seed: Some(42),
            stop_sequences: default_stop_sequences(),

            sink_batch_size: 1,
            progress_interval: Duration::from_secs(30),

            thresholds: ValidationThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WRITEFORGE_MAX_WORKERS`: Concurrent items (default: 64)
    /// - `WRITEFORGE_STAGE_ATTEMPTS`: Attempts per stage (default: 10)
    /// - `WRITEFORGE_REQUEST_ATTEMPTS`: Requests per completion (default: 2)
    /// - `WRITEFORGE_REQUEST_TIMEOUT_SECS`: Request timeout (default: 1200)
    /// - `WRITEFORGE_ENDPOINT`: Chat-completions URL
    /// - `WRITEFORGE_API_KEY`: Bearer token (optional)
    /// - `WRITEFORGE_MODEL`: Model name (default: default)
    /// - `WRITEFORGE_TEMPERATURE`: Sampling temperature (default: 0.6)
    /// - `WRITEFORGE_TOP_P`: Nucleus sampling (default: 0.95)
    /// - `WRITEFORGE_MAX_TOKENS`: Completion token limit (default: 32768)
    /// - `WRITEFORGE_SEED`: Sampling seed, or `none` to omit (default: 42)
    /// - `WRITEFORGE_STOP`: Comma-separated stop sequences
    /// - `WRITEFORGE_SINK_BATCH_SIZE`: Results per sink write (default: 1)
    /// - `WRITEFORGE_PROGRESS_INTERVAL_SECS`: Progress log interval (default: 30)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(val) = lookup("WRITEFORGE_MAX_WORKERS") {
            config.max_concurrent_items = parse_env_value(&val, "WRITEFORGE_MAX_WORKERS")?;
        }

        if let Some(val) = lookup("WRITEFORGE_STAGE_ATTEMPTS") {
            config.stage_max_attempts = parse_env_value(&val, "WRITEFORGE_STAGE_ATTEMPTS")?;
        }

        if let Some(val) = lookup("WRITEFORGE_REQUEST_ATTEMPTS") {
            config.request_max_attempts = parse_env_value(&val, "WRITEFORGE_REQUEST_ATTEMPTS")?;
        }

        if let Some(val) = lookup("WRITEFORGE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "WRITEFORGE_REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("WRITEFORGE_ENDPOINT") {
            config.endpoint_url = val;
        }

        if let Some(val) = lookup("WRITEFORGE_API_KEY") {
            config.api_key = Some(val).filter(|k| !k.is_empty());
        }

        if let Some(val) = lookup("WRITEFORGE_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("WRITEFORGE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "WRITEFORGE_TEMPERATURE")?;
        }

        if let Some(val) = lookup("WRITEFORGE_TOP_P") {
            config.top_p = parse_env_value(&val, "WRITEFORGE_TOP_P")?;
        }

        if let Some(val) = lookup("WRITEFORGE_MAX_TOKENS") {
            config.max_tokens = parse_env_value(&val, "WRITEFORGE_MAX_TOKENS")?;
        }

        if let Some(val) = lookup("WRITEFORGE_SEED") {
            config.seed = if val.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_env_value(&val, "WRITEFORGE_SEED")?)
            };
        }

        if let Some(val) = lookup("WRITEFORGE_STOP") {
            config.stop_sequences = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(val) = lookup("WRITEFORGE_SINK_BATCH_SIZE") {
            config.sink_batch_size = parse_env_value(&val, "WRITEFORGE_SINK_BATCH_SIZE")?;
        }

        if let Some(val) = lookup("WRITEFORGE_PROGRESS_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "WRITEFORGE_PROGRESS_INTERVAL_SECS")?;
            config.progress_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_items == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_items must be greater than 0".to_string(),
            ));
        }

        if self.stage_max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "stage_max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.request_max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "request_max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "endpoint_url cannot be empty".to_string(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::ValidationFailed(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.sink_batch_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "sink_batch_size must be greater than 0".to_string(),
            ));
        }

        if self.progress_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "progress_interval must be greater than 0".to_string(),
            ));
        }

        self.thresholds
            .check()
            .map_err(|msg| ConfigError::ValidationFailed(format!("thresholds: {}", msg)))
    }

    /// Sampling parameters for the text completer.
    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            model: self.model.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            seed: self.seed,
            stop: self.stop_sequences.clone(),
        }
    }

    /// Builder method to set max concurrent items.
    pub fn with_max_concurrent_items(mut self, max: usize) -> Self {
        self.max_concurrent_items = max;
        self
    }

    /// Builder method to set attempts per stage.
    pub fn with_stage_max_attempts(mut self, attempts: u32) -> Self {
        self.stage_max_attempts = attempts;
        self
    }

    /// Builder method to set requests per completion.
    pub fn with_request_max_attempts(mut self, attempts: u32) -> Self {
        self.request_max_attempts = attempts;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sink_batch_size(mut self, size: usize) -> Self {
        self.sink_batch_size = size;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ValidationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Parse an environment variable value into a type.
pub(crate) fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
