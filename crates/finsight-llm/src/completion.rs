//! Completion request and response types
//!
//! A request is a short chat (usually a single user turn carrying the whole
//! analysis prompt). Raw-generation backends such as Ollama's `/api/generate`
//! flatten it with [`CompletionRequest::prompt_text`].

use crate::{Message, Role};
use serde::{Deserialize, Serialize};

/// A single text-completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Backend-specific model name, e.g. `deepseek-r1:1.5b`
    pub model: String,

    pub messages: Vec<Message>,

    /// Sent as the backend's system prompt when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Generation cap; the backend's own limit applies when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Backend default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder {
            request: CompletionRequest {
                model: model.into(),
                messages: Vec::new(),
                system: None,
                max_tokens: None,
                temperature: None,
                stop_sequences: None,
            },
        }
    }

    /// User turns joined by blank lines, for backends that take one prompt
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(Message::text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Builder for [`CompletionRequest`]
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    pub fn add_message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.request.stop_sequences = Some(sequences);
        self
    }

    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

/// A finished (non-streamed) completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The assistant turn
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn text(&self) -> &str {
        self.message.text()
    }

    /// Whether generation was cut off by the token limit
    pub fn truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}

/// Why generation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished on its own (or hit a stop sequence)
    EndTurn,
    /// `max_tokens` was reached
    MaxTokens,
}

/// Token counts as reported by the backend; zero when it reports none
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}
