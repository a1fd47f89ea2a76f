//! LLM integration for writeforge.
//!
//! Generation and judging both talk to an OpenAI-compatible chat-completions
//! endpoint through the [`LlmProvider`] trait. [`CompletionClient`] is the HTTP
//! implementation; tests substitute in-process mocks.
//!
//! [`TextCompleter`] layers the retry policy on top: each attempt is one
//! request, failures are logged and retried immediately, and the caller gets
//! back either the reply text or `None`.
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use writeforge::llm::{CompletionClient, SamplingParams, TextCompleter};
//!
//! let client = CompletionClient::new(
//!     "http://localhost:8000/v1/chat/completions",
//!     None,
//!     Duration::from_secs(1200),
//! )?;
//! let completer = TextCompleter::new(Arc::new(client), SamplingParams::default());
//! let reply = completer.complete("Outline an essay on tides.", 2).await;
//! ```

pub mod client;
pub mod completer;

pub use client::{
    Choice, CompletionClient, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage,
};
pub use completer::{default_stop_sequences, SamplingParams, TextCompleter};
