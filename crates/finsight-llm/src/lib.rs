//! LLM provider abstraction layer for finsight
//!
//! This crate provides provider-agnostic abstractions for text completion
//! against Large Language Models (LLMs). It includes:
//!
//! - Message types for LLM communication
//! - Completion request/response types
//! - A fragment stream type for incremental (streaming) consumption
//! - Provider trait for LLM implementations
//! - Concrete provider implementations (behind feature flags)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod stream;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
pub use stream::{LineBuffer, TextStream};

// Provider implementations (feature-gated)
#[cfg(any(feature = "openai", feature = "ollama"))]
pub mod providers;
