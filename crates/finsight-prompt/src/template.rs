//! Core prompt template trait
//!
//! This module defines the [`PromptTemplate`] trait that all template implementations must follow.

use crate::Result;
use std::collections::BTreeSet;

/// Core trait for prompt templates
///
/// Variables are passed as `serde_json::Value` so the trait stays dyn-compatible.
pub trait PromptTemplate: Send + Sync {
    /// Get the template name/identifier
    fn name(&self) -> &str;

    /// Render the template with variables
    fn render(&self, vars: &serde_json::Value) -> Result<String>;

    /// Get the raw template source (for debugging/inspection)
    fn raw_template(&self) -> &str;

    /// Top-level variables the template reads
    fn variables(&self) -> BTreeSet<String>;
}
