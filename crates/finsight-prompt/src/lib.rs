//! Prompt template management for finsight
//!
//! This crate provides the templating layer the analysis pipeline renders its
//! prompts with:
//!
//! - **Strict rendering**: Jinja2 templates (via MiniJinja) that fail on any
//!   variable the caller did not supply
//! - **Formatting filters**: `money`, `pct` and `fixed` for financial figures
//! - **Template registry**: name-keyed storage built once at start-up
//! - **Builder pattern**: fluent API for data-driven prompt fragments
//!
//! # Quick Start
//!
//! ```
//! use finsight_prompt::{JinjaTemplate, PromptRegistry};
//! use serde_json::json;
//!
//! let mut registry = PromptRegistry::new();
//! registry.register(
//!     JinjaTemplate::strict("valuation", "P/E for {{ symbol }}: {{ pe }}").unwrap(),
//! );
//!
//! let prompt = registry
//!     .render("valuation", &json!({ "symbol": "MSFT", "pe": 34.2 }))
//!     .unwrap();
//! assert_eq!(prompt, "P/E for MSFT: 34.2");
//! ```

mod builder;
mod error;
mod jinja;
mod registry;
mod template;

// Re-export core types
pub use builder::PromptBuilder;
pub use error::{PromptError, Result};
pub use jinja::{JinjaTemplate, format_money};
pub use registry::PromptRegistry;
pub use template::PromptTemplate;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::PromptBuilder;
    pub use crate::error::{PromptError, Result};
    pub use crate::jinja::JinjaTemplate;
    pub use crate::registry::PromptRegistry;
    pub use crate::template::PromptTemplate;
}
