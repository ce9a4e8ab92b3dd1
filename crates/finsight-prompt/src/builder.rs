//! Line-oriented builder for data-driven prompt fragments
//!
//! Templates cover the fixed prose of a prompt; [`PromptBuilder`] assembles the
//! variable-length parts (per-period metrics, price summaries) that are passed
//! into them as a single pre-rendered value.

/// Accumulates prompt lines
///
/// # Examples
///
/// ```
/// use finsight_prompt::PromptBuilder;
///
/// let block = PromptBuilder::new()
///     .bullets(["2024-06-30: current ratio 0.95", "2024-09-30: current ratio 0.87"])
///     .build_trimmed();
///
/// assert_eq!(block, "- 2024-06-30: current ratio 0.95\n- 2024-09-30: current ratio 0.87");
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    lines: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `- item` line
    pub fn bullet(mut self, item: impl Into<String>) -> Self {
        self.lines.push(format!("- {}", item.into()));
        self
    }

    /// Append one `- item` line per item, in order
    pub fn bullets<I, S>(self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        items.into_iter().fold(self, PromptBuilder::bullet)
    }

    /// Lines joined with `\n`, each one terminated
    pub fn build(self) -> String {
        self.lines.iter().fold(String::new(), |mut out, line| {
            out.push_str(line);
            out.push('\n');
            out
        })
    }

    /// Like [`build`](Self::build) with surrounding whitespace removed
    pub fn build_trimmed(self) -> String {
        self.build().trim().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
