//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use writeforge::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use writeforge::LlmError;

/// A plan transcript of exactly `units` length units with 2 answers and 1
/// think. The six marker names and two answer words count as units.
pub fn plan_transcript(units: usize) -> String {
    let filler = units.saturating_sub(8);
    format!(
        "<think>{}</think><answer>alpha</answer><answer>beta</answer>",
        "idea ".repeat(filler)
    )
}

/// A write or refine transcript with `sections` balanced think/answer pairs.
pub fn sectioned_transcript(label: &str, sections: usize, filler: usize) -> String {
    (0..sections)
        .map(|i| {
            format!(
                "<think>{}</think><answer>{} {}</answer>",
                "reason ".repeat(filler),
                label,
                i
            )
        })
        .collect()
}

pub fn response(content: String) -> GenerationResponse {
    GenerationResponse {
        id: "mock".to_string(),
        model: "mock".to_string(),
        choices: vec![Choice {
            index: 0,
            message: Message::assistant(content),
            finish_reason: Some("stop".to_string()),
        }],
        usage: Usage::default(),
    }
}

/// Which reply the mock gives to one stage.
#[derive(Debug, Clone)]
pub enum Reply {
    Valid,
    Text(String),
    Fail,
}

/// Answers each stage according to its script and records every prompt.
pub struct MockLlmProvider {
    pub plan: Reply,
    pub write: Reply,
    pub refine: Reply,
    /// Reject every `n`th call with unusable text, if set.
    pub sabotage_every: Option<usize>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl MockLlmProvider {
    pub fn new(plan: Reply, write: Reply, refine: Reply) -> Self {
        Self {
            plan,
            write,
            refine,
            sabotage_every: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn all_valid() -> Self {
        Self::new(Reply::Valid, Reply::Valid, Reply::Valid)
    }

    pub fn always_failing() -> Self {
        Self::new(Reply::Fail, Reply::Fail, Reply::Fail)
    }

    pub fn with_sabotage_every(mut self, n: usize) -> Self {
        self.sabotage_every = Some(n);
        self
    }

    pub fn prompts_with_prefix(&self, prefix: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let prompt = request.messages[0].content.clone();
        self.prompts.lock().unwrap().push(prompt.clone());

        if let Some(n) = self.sabotage_every {
            if call % n == 0 {
                return Ok(response("sorry, I cannot help".to_string()));
            }
        }

        let (reply, valid) = if prompt.starts_with("Superwrite-Stage-1") {
            (&self.plan, plan_transcript(600))
        } else if prompt.starts_with("Superwrite-Stage-2") {
            (&self.write, sectioned_transcript("draft", 4, 300))
        } else {
            (&self.refine, sectioned_transcript("final", 4, 300))
        };

        match reply {
            Reply::Valid => Ok(response(valid)),
            Reply::Text(text) => Ok(response(text.clone())),
            Reply::Fail => Err(LlmError::RequestFailed("connection refused".to_string())),
        }
    }
}
