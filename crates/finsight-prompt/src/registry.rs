//! Prompt template registry
//!
//! This module provides [`PromptRegistry`], a name-keyed store of prompt
//! templates. Registries are filled once at start-up and then shared
//! read-only.

use crate::{PromptError, PromptTemplate, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A registry for managing prompt templates
///
/// # Examples
///
/// ```
/// use finsight_prompt::{JinjaTemplate, PromptRegistry};
/// use serde_json::json;
///
/// let mut registry = PromptRegistry::new();
/// registry.register(JinjaTemplate::strict("greeting", "Analyze {{ symbol }}").unwrap());
///
/// let prompt = registry.render("greeting", &json!({ "symbol": "AAPL" })).unwrap();
/// assert_eq!(prompt, "Analyze AAPL");
/// ```
#[derive(Clone, Default)]
pub struct PromptRegistry {
    templates: HashMap<String, Arc<dyn PromptTemplate>>,
}

impl PromptRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template
    ///
    /// If a template with the same name already exists, it will be replaced.
    pub fn register<T: PromptTemplate + 'static>(&mut self, template: T) {
        self.templates
            .insert(template.name().to_string(), Arc::new(template));
    }

    /// Get a template by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn PromptTemplate>> {
        self.templates.get(name).cloned()
    }

    /// Render a registered template
    ///
    /// # Errors
    ///
    /// Returns an error if the template is not registered or rendering fails.
    pub fn render(&self, name: &str, vars: &serde_json::Value) -> Result<String> {
        self.templates
            .get(name)
            .ok_or_else(|| PromptError::TemplateNotRegistered(name.to_string()))?
            .render(vars)
    }

    /// Names of all registered templates, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRegistry")
            .field("templates", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JinjaTemplate;
    use serde_json::json;

    #[test]
    fn test_register_and_render() {
        let mut registry = PromptRegistry::new();
        assert!(registry.is_empty());

        registry.register(JinjaTemplate::strict("a", "A {{ x }}").unwrap());
        registry.register(JinjaTemplate::strict("b", "B").unwrap());

        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_some());
        assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.render("a", &json!({ "x": 1 })).unwrap(), "A 1");
    }

    #[test]
    fn test_replace_existing() {
        let mut registry = PromptRegistry::new();
        registry.register(JinjaTemplate::strict("a", "old").unwrap());
        registry.register(JinjaTemplate::strict("a", "new").unwrap());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().raw_template(), "new");
    }

    #[test]
    fn test_render_unregistered() {
        let registry = PromptRegistry::new();
        assert_eq!(
            registry.render("missing", &json!({})),
            Err(PromptError::TemplateNotRegistered("missing".to_string()))
        );
    }
}
