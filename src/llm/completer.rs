//! Prompt-in, text-out completion with bounded immediate retries.

use std::sync::Arc;
use std::time::Instant;

use super::client::{GenerationRequest, LlmProvider, Message};
use crate::metrics::MetricsCollector;

/// Sampling parameters applied to every request a completer sends.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub seed: Option<u64>,
    pub stop: Vec<String>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.6,
            top_p: 0.95,
            max_tokens: 32_768,
            seed: Some(42),
            stop: default_stop_sequences(),
        }
    }
}

/// Chat-template terminators the generation models are trained to emit.
pub fn default_stop_sequences() -> Vec<String> {
    vec![
        "<|user|>".to_string(),
        "<|endoftext|>".to_string(),
        "#*# finish.".to_string(),
    ]
}

/// Sends a single-turn prompt and returns the trimmed reply text.
///
/// Every failure mode (transport error, non-2xx status, timeout, malformed
/// body, empty choices) is treated the same: log it and try again at once,
/// up to the caller's attempt budget. Callers only ever see `Some(text)` or
/// `None`.
#[derive(Clone)]
pub struct TextCompleter {
    provider: Arc<dyn LlmProvider>,
    params: SamplingParams,
    metrics: MetricsCollector,
}

impl TextCompleter {
    pub fn new(provider: Arc<dyn LlmProvider>, params: SamplingParams) -> Self {
        Self {
            provider,
            params,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    /// Build the request body for `prompt`.
    pub fn request_for(&self, prompt: &str) -> GenerationRequest {
        let mut request = GenerationRequest::new(&self.params.model, vec![Message::user(prompt)])
            .with_temperature(self.params.temperature)
            .with_top_p(self.params.top_p)
            .with_max_tokens(self.params.max_tokens)
            .with_stop(self.params.stop.clone());
        if let Some(seed) = self.params.seed {
            request = request.with_seed(seed);
        }
        request
    }

    /// Complete `prompt`, making at most `max_attempts` requests.
    pub async fn complete(&self, prompt: &str, max_attempts: u32) -> Option<String> {
        let request = self.request_for(prompt);

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            let result = self.provider.generate(request.clone()).await;
            let latency = started.elapsed().as_secs_f64();

            match result {
                Ok(response) => match response.first_content() {
                    Some(content) => {
                        self.metrics.record_llm_request(true, latency);
                        return Some(content.trim().to_string());
                    }
                    None => {
                        self.metrics.record_llm_request(false, latency);
                        tracing::warn!(
                            attempt = attempt,
                            max_attempts = max_attempts,
                            "LLM response had no choices"
                        );
                    }
                },
                Err(err) => {
                    self.metrics.record_llm_request(false, latency);
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %err,
                        "LLM request failed"
                    );
                }
            }
        }

        None
    }
}
