//! Error types for the analysis pipeline

use finsight_llm::LLMError;
use finsight_prompt::PromptError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fetching company data or the symbol universe
    DataFetch,
    /// Normalizing data and rendering prompts
    PromptBuild,
    /// Running prompts through the model
    Inference,
    /// Writing the report artifact
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::DataFetch => "data fetch",
            Stage::PromptBuild => "prompt build",
            Stage::Inference => "inference",
            Stage::Persistence => "persistence",
        })
    }
}

/// Analysis pipeline errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A required upstream field was absent or null
    #[error("Missing field '{field}' required by template '{template}'")]
    MissingField { field: String, template: String },

    /// The model failed on a prompt; `completed` holds the cleaned outputs
    /// of every prompt before it
    #[error("Inference failed at prompt {prompt}: {source}")]
    Inference {
        prompt: usize,
        completed: Vec<String>,
        #[source]
        source: LLMError,
    },

    /// The market-data provider failed; the message is the provider's own
    #[error("{0}")]
    Provider(String),

    /// Price history could not be normalized
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Template parsing, validation or rendering failed
    #[error("Template error: {0}")]
    Template(#[from] PromptError),

    /// Writing the report failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}

impl AnalysisError {
    /// Stage the error was raised in
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::Provider(_) => Stage::DataFetch,
            AnalysisError::MissingField { .. }
            | AnalysisError::Normalization(_)
            | AnalysisError::Template(_) => Stage::PromptBuild,
            AnalysisError::Inference { .. } => Stage::Inference,
            AnalysisError::Persistence(_) => Stage::Persistence,
        }
    }

    pub(crate) fn missing(field: impl Into<String>, template: impl Into<String>) -> Self {
        AnalysisError::MissingField {
            field: field.into(),
            template: template.into(),
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
