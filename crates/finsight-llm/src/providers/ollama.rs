//! Ollama provider implementation
//!
//! Talks to a local Ollama server through its native `/api/generate` endpoint.
//! Streamed responses arrive as newline-delimited JSON objects, the last one
//! carrying `"done": true` together with token counts.

use crate::stream::{LineEvent, line_stream};
use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, StopReason,
    TextStream, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 600;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default local reasoning model
pub const DEFAULT_OLLAMA_MODEL: &str = "deepseek-r1:1.5b";

/// Configuration for Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server address (default: "http://localhost:11434")
    pub host: String,

    /// Deadline in seconds for a blocking generate call, and the longest gap
    /// allowed between streamed chunks; local models can be slow to load
    pub timeout_secs: u64,
}

impl OllamaConfig {
    /// Create a config for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from `OLLAMA_HOST`, falling back to the local default
    pub fn from_env() -> Self {
        finsight_utils::env_string("OLLAMA_HOST").map_or_else(Self::default, Self::new)
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_HOST)
    }
}

/// Ollama provider
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider from the environment
    pub fn from_env() -> Result<Self> {
        Self::with_config(OllamaConfig::from_env())
    }

    /// Get the current configuration
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let body = GenerateRequest::from_completion(request, stream);

        let mut builder = self
            .client
            .post(format!("{}/api/generate", self.config.host))
            .json(&body);
        // A stream may run longer than the deadline as long as chunks keep coming
        if !stream {
            builder = builder.timeout(Duration::from_secs(self.config.timeout_secs));
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await?;
            return Err(LLMError::from_status(status, error_text, &request.model));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    #[instrument(skip(self, request), fields(model = %request.model, host = %self.config.host))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending generate request to {}", self.config.host);

        let response = self.send(&request, false).await?;
        let generated: GenerateResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        if let Some(error) = generated.error {
            return Err(LLMError::RequestFailed(error));
        }

        debug!(
            "Received response - done_reason: {:?}, tokens: {}/{}",
            generated.done_reason, generated.prompt_eval_count, generated.eval_count
        );

        Ok(CompletionResponse {
            message: Message::assistant(generated.response),
            stop_reason: map_done_reason(generated.done_reason.as_deref()),
            usage: TokenUsage {
                input_tokens: generated.prompt_eval_count,
                output_tokens: generated.eval_count,
            },
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model, host = %self.config.host))]
    async fn stream(&self, request: CompletionRequest) -> Result<TextStream> {
        debug!("Opening generate stream to {}", self.config.host);

        let response = self.send(&request, true).await?;
        Ok(line_stream(response.bytes_stream(), parse_ndjson_line))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

impl GenerateRequest {
    fn from_completion(request: &CompletionRequest, stream: bool) -> Self {
        Self {
            model: request.model.clone(),
            prompt: request.prompt_text(),
            system: request.system.clone(),
            stream,
            options: GenerateOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
                stop: request.stop_sequences.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
    #[serde(default)]
    error: Option<String>,
}

/// Parse one NDJSON line of a streamed generate response
fn parse_ndjson_line(line: &str) -> LineEvent {
    match serde_json::from_str::<GenerateResponse>(line) {
        Ok(GenerateResponse {
            error: Some(error), ..
        }) => LineEvent::Failed(LLMError::RequestFailed(error)),
        Ok(chunk) if chunk.done => LineEvent::Finished(Some(chunk.response)),
        Ok(chunk) => LineEvent::Text(chunk.response),
        Err(e) => LineEvent::Failed(LLMError::UnexpectedResponse(format!(
            "Malformed stream chunk: {e}"
        ))),
    }
}

fn map_done_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}
