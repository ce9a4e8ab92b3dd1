use super::{TemplateId, templates};
use crate::error::Result;
use finsight_prompt::{JinjaTemplate, PromptError, PromptRegistry, PromptTemplate};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

const MEMORY_TEMPLATE: &str = "memory";

/// Validated, immutable set of analysis templates plus the memory prefix
///
/// Built once at startup. Every template is rendered in strict mode against
/// its declared fields before the catalog is handed out, so a template that
/// reads an undeclared variable never reaches a run.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    registry: PromptRegistry,
}

impl PromptCatalog {
    /// Catalog with the built-in template texts
    pub fn new() -> Result<Self> {
        let mut registry = PromptRegistry::new();
        for id in TemplateId::ALL {
            registry.register(JinjaTemplate::strict(id.name(), id.default_source())?);
        }
        registry.register(JinjaTemplate::strict(MEMORY_TEMPLATE, templates::MEMORY)?);

        let catalog = Self { registry };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Replace the text of one template, revalidating the catalog
    pub fn with_template(mut self, id: TemplateId, source: impl Into<String>) -> Result<Self> {
        self.registry
            .register(JinjaTemplate::strict(id.name(), source)?);
        self.validate()?;
        Ok(self)
    }

    /// Replace the memory prefix template; it may only read `memory`
    pub fn with_memory_template(mut self, source: impl Into<String>) -> Result<Self> {
        self.registry
            .register(JinjaTemplate::strict(MEMORY_TEMPLATE, source)?);
        self.validate()?;
        Ok(self)
    }

    /// Render one template
    pub fn render(&self, id: TemplateId, vars: &Map<String, Value>) -> Result<String> {
        Ok(self.registry.render(id.name(), &Value::Object(vars.clone()))?)
    }

    /// Render the memory prefix for the given cleaned outputs
    ///
    /// An empty history renders as an empty prefix.
    pub fn render_memory(&self, history: &[String]) -> Result<String> {
        if history.is_empty() {
            return Ok(String::new());
        }
        Ok(self
            .registry
            .render(MEMORY_TEMPLATE, &json!({ "memory": history }))?)
    }

    fn validate(&self) -> Result<()> {
        for id in TemplateId::ALL {
            let declared: BTreeSet<&str> = id.fields().iter().map(|f| f.name).collect();
            let placeholders: Map<String, Value> = declared
                .iter()
                .map(|name| ((*name).to_string(), Value::from("undefined")))
                .collect();
            self.check(id.name(), &declared, &Value::Object(placeholders))?;
        }

        let declared = BTreeSet::from(["memory"]);
        self.check(
            MEMORY_TEMPLATE,
            &declared,
            &json!({ "memory": ["first section", "second section"] }),
        )
    }

    fn check(&self, name: &str, declared: &BTreeSet<&str>, sample: &Value) -> Result<()> {
        let template = self
            .registry
            .get(name)
            .ok_or_else(|| PromptError::TemplateNotRegistered(name.to_string()))?;

        if let Some(unknown) = template
            .variables()
            .into_iter()
            .find(|var| !declared.contains(var.as_str()))
        {
            return Err(PromptError::UndefinedVariable {
                name: name.to_string(),
                detail: format!("'{unknown}' is not a declared field"),
            }
            .into());
        }

        template.render(sample)?;
        Ok(())
    }
}
