//! MiniJinja-based template implementation
//!
//! [`JinjaTemplate`] renders Jinja2 syntax through MiniJinja in strict mode:
//! referencing a variable that was not supplied is an error instead of
//! silently rendering as an empty string.

use crate::{PromptError, PromptTemplate, Result};
use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use std::collections::BTreeSet;

/// A prompt template backed by MiniJinja
///
/// Besides the MiniJinja built-ins, three filters are available:
/// - `money`: `{{ cap | money }}` renders `2950000000000` as `$2.95T`
/// - `pct`: `{{ margin | pct }}` renders `0.2531` as `25.31%`
/// - `fixed`: `{{ pe | fixed }}` renders `34.2312` as `34.23`
///
/// Non-numeric values pass through all three unchanged, so placeholders such
/// as `"undefined"` survive formatting.
///
/// # Examples
///
/// ```
/// use finsight_prompt::{JinjaTemplate, PromptTemplate};
/// use serde_json::json;
///
/// let template = JinjaTemplate::strict("overview", "{{ company }} is worth {{ cap | money }}").unwrap();
/// let text = template.render(&json!({ "company": "AAPL", "cap": 2.95e12 })).unwrap();
/// assert_eq!(text, "AAPL is worth $2.95T");
/// ```
pub struct JinjaTemplate {
    name: String,
    source: String,
}

impl JinjaTemplate {
    /// Parse a template that fails to render when a variable is missing
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::TemplateParseFailed`] if the source does not parse.
    pub fn strict(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let template = Self {
            name: name.into(),
            source: source.into(),
        };
        template
            .environment()
            .template_from_str(&template.source)
            .map_err(|e| PromptError::TemplateParseFailed {
                name: template.name.clone(),
                detail: e.to_string(),
            })?;
        Ok(template)
    }

    fn environment(&self) -> Environment<'_> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_filter("money", money);
        env.add_filter("pct", pct);
        env.add_filter("fixed", fixed);
        env
    }
}

impl PromptTemplate for JinjaTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, vars: &serde_json::Value) -> Result<String> {
        let env = self.environment();
        let template = env
            .template_from_str(&self.source)
            .map_err(|e| PromptError::TemplateParseFailed {
                name: self.name.clone(),
                detail: e.to_string(),
            })?;

        template
            .render(Value::from_serialize(vars))
            .map_err(|e| match e.kind() {
                ErrorKind::UndefinedError => PromptError::UndefinedVariable {
                    name: self.name.clone(),
                    detail: e.to_string(),
                },
                _ => PromptError::RenderError {
                    name: self.name.clone(),
                    detail: e.to_string(),
                },
            })
    }

    fn raw_template(&self) -> &str {
        &self.source
    }

    fn variables(&self) -> BTreeSet<String> {
        let env = self.environment();
        env.template_from_str(&self.source)
            .map(|t| t.undeclared_variables(false).into_iter().collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for JinjaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JinjaTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn as_number(value: &Value) -> Option<f64> {
    if value.kind() == ValueKind::Number {
        f64::try_from(value.clone()).ok()
    } else {
        None
    }
}

/// Format a dollar amount with a T/B/M suffix
pub fn format_money(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let abs = amount.abs();
    if abs >= 1_000_000_000_000.0 {
        format!("{sign}${:.2}T", abs / 1_000_000_000_000.0)
    } else if abs >= 1_000_000_000.0 {
        format!("{sign}${:.2}B", abs / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("{sign}${:.2}M", abs / 1_000_000.0)
    } else {
        format!("{sign}${abs:.2}")
    }
}

fn money(value: Value) -> String {
    as_number(&value).map_or_else(|| value.to_string(), format_money)
}

fn pct(value: Value) -> String {
    as_number(&value).map_or_else(|| value.to_string(), |n| format!("{:.2}%", n * 100.0))
}

fn fixed(value: Value) -> String {
    as_number(&value).map_or_else(|| value.to_string(), |n| format!("{n:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_template() {
        let template = JinjaTemplate::strict("test", "Hello, {{ name }}!").unwrap();
        let result = template.render(&json!({ "name": "World" })).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_strict_rejects_missing_variable() {
        let template = JinjaTemplate::strict("health", "Revenue: {{ revenue }}").unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, PromptError::UndefinedVariable { ref name, .. } if name == "health"));
    }

    #[test]
    fn test_invalid_template_error() {
        assert!(matches!(
            JinjaTemplate::strict("test", "{{ unclosed"),
            Err(PromptError::TemplateParseFailed { .. })
        ));
    }

    #[test]
    fn test_money_and_pct_filters() {
        let template =
            JinjaTemplate::strict("f", "{{ cap | money }} {{ debt | money }} {{ m | pct }} {{ pe | fixed }}")
                .unwrap();
        let result = template
            .render(&json!({ "cap": 1.5e12, "debt": -2_500_000.0, "m": 0.2531, "pe": 34.2312 }))
            .unwrap();
        assert_eq!(result, "$1.50T -$2.50M 25.31% 34.23");
    }

    #[test]
    fn test_filters_pass_through_placeholders() {
        let template = JinjaTemplate::strict("f", "{{ cap | money }} {{ m | pct }} {{ r | fixed }}").unwrap();
        let result = template
            .render(&json!({ "cap": "undefined", "m": "undefined", "r": "undefined" }))
            .unwrap();
        assert_eq!(result, "undefined undefined undefined");
    }

    #[test]
    fn test_variables() {
        let template = JinjaTemplate::strict(
            "v",
            "{{ symbol }} {% for row in rows %}{{ row.close }}{% endfor %}",
        )
        .unwrap();
        let vars: Vec<String> = template.variables().into_iter().collect();
        assert_eq!(vars, vec!["rows".to_string(), "symbol".to_string()]);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(2_950_000_000_000.0), "$2.95T");
        assert_eq!(format_money(383_000_000_000.0), "$383.00B");
        assert_eq!(format_money(12_340_000.0), "$12.34M");
        assert_eq!(format_money(999.5), "$999.50");
    }
}
