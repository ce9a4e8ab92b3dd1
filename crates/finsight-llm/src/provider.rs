//! LLM provider trait definition

use crate::{CompletionRequest, CompletionResponse, Result, TextStream};
use async_trait::async_trait;

/// Trait for LLM providers
///
/// Implementations of this trait provide access to different LLM services
/// (e.g., OpenAI-compatible servers, Ollama).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM and wait for the full response
    ///
    /// # Arguments
    ///
    /// * `request` - The completion request with messages and parameters
    ///
    /// # Returns
    ///
    /// The completion response with the assistant's message and metadata
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Generate a completion incrementally
    ///
    /// The returned stream yields text fragments in arrival order and ends when
    /// the backend signals completion. A connection that drops early surfaces
    /// as a final error item.
    async fn stream(&self, request: CompletionRequest) -> Result<TextStream>;

    /// Get the provider name (e.g., "openai", "ollama")
    fn name(&self) -> &str;
}
