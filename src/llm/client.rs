//! OpenAI-compatible chat-completions client.
//!
//! This module provides the request/response types shared by every provider,
//! the [`LlmProvider`] trait, and [`CompletionClient`], which posts to a fully
//! qualified chat-completions endpoint (e.g. a local vLLM or SGLang server).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier to use for generation.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Sampling seed, for servers that support reproducible sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sequences at which generation stops.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
            seed: None,
            stop: Vec::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: Option<String>,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct CompletionClient {
    /// Full URL requests are posted to.
    endpoint: String,
    /// Optional bearer token.
    api_key: Option<String>,
    timeout: Duration,
    http_client: Client,
}

impl CompletionClient {
    /// Create a client posting to `endpoint`, bounding each request by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::ClientBuild` if the HTTP client cannot be constructed.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::ClientBuild(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Internal response structure from the OpenAI-compatible API.
///
/// Local inference servers are inconsistent about `id`, `model` and `usage`,
/// so only `choices` is required.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default = "assistant_role")]
    role: String,
    #[serde(default)]
    content: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for CompletionClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let mut http_request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request.json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    secs: self.timeout.as_secs(),
                }
            } else {
                LlmError::RequestFailed(e.to_string())
            }
        })?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();

            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            if status_code == 429 {
                return Err(LlmError::RateLimited(message));
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message,
            });
        }

        let body = http_response
            .text()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        parse_api_response(&body)
    }
}

/// Convert a raw chat-completions body into a [`GenerationResponse`].
fn parse_api_response(body: &str) -> Result<GenerationResponse, LlmError> {
    let api_response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

    if api_response.choices.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let mut choices = Vec::with_capacity(api_response.choices.len());
    for choice in api_response.choices {
        let content = choice.message.content.ok_or_else(|| {
            LlmError::ParseError(format!("choice {} has no message content", choice.index))
        })?;
        choices.push(Choice {
            index: choice.index,
            message: Message {
                role: choice.message.role,
                content,
            },
            finish_reason: choice.finish_reason,
        });
    }

    let usage = api_response
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(GenerationResponse {
        id: api_response.id,
        model: api_response.model,
        choices,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, "system");
        assert_eq!(Message::user("u").role, "user");
        let assistant = Message::assistant("Hi there!");
        assert_eq!(assistant.role, "assistant");
        assert_eq!(assistant.content, "Hi there!");
    }

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::new("local-model", vec![Message::user("test")])
            .with_temperature(0.6)
            .with_max_tokens(32768)
            .with_top_p(0.95)
            .with_seed(42)
            .with_stop(vec!["<|user|>".to_string()]);

        assert_eq!(request.model, "local-model");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, Some(0.6));
        assert_eq!(request.max_tokens, Some(32768));
        assert_eq!(request.top_p, Some(0.95));
        assert_eq!(request.seed, Some(42));
        assert_eq!(request.stop, vec!["<|user|>"]);
    }

    #[test]
    fn test_request_serialization_skips_unset_fields() {
        let request = GenerationRequest::new("m", vec![Message::user("hi")]);
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("temperature").is_none());
        assert!(json.get("seed").is_none());
        assert!(json.get("stop").is_none());

        let request = request.with_seed(7).with_stop(vec!["#*# finish.".to_string()]);
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["seed"], 7);
        assert_eq!(json["stop"][0], "#*# finish.");
    }

    #[test]
    fn test_parse_minimal_response() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let response = parse_api_response(body).expect("should parse");
        assert_eq!(response.first_content(), Some("hello"));
        assert_eq!(response.choices[0].message.role, "assistant");
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn test_parse_full_response() {
        let body = r#"{
            "id": "cmpl-1",
            "model": "qwen",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "text"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response = parse_api_response(body).expect("should parse");
        assert_eq!(response.id, "cmpl-1");
        assert_eq!(response.model, "qwen");
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.total_tokens, 15);
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(
            parse_api_response(r#"{"choices":[]}"#),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(
            parse_api_response("not json"),
            Err(LlmError::ParseError(_))
        ));
        assert!(matches!(
            parse_api_response(r#"{"choices":[{"message":{"role":"assistant"}}]}"#),
            Err(LlmError::ParseError(_))
        ));
    }

    #[test]
    fn test_client_ignores_empty_api_key() {
        let client =
            CompletionClient::new("http://localhost:1/v1/chat/completions", Some(String::new()), Duration::from_secs(5))
                .expect("client should build");
        assert!(!client.has_api_key());
        assert_eq!(client.endpoint(), "http://localhost:1/v1/chat/completions");
    }
}
