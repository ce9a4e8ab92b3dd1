//! Rolling context carried between prompts of one run

use crate::error::Result;
use crate::prompts::PromptCatalog;
use crate::stripper::strip_think;

/// Append-only list of cleaned model outputs
///
/// The only way in is [`MemoryBuffer::record`], which strips reasoning spans
/// first, so raw output never reaches a later prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBuffer {
    entries: Vec<String>,
}

impl MemoryBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Clean a raw response, append it and return the cleaned text
    pub fn record(&mut self, raw: &str) -> String {
        let cleaned = strip_think(raw);
        self.entries.push(cleaned.clone());
        cleaned
    }

    /// Cleaned outputs in prompt order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text submitted for the next prompt: the memory prefix followed by the
    /// prompt itself
    pub fn submission(&self, catalog: &PromptCatalog, prompt: &str) -> Result<String> {
        let mut text = catalog.render_memory(&self.entries)?;
        text.push_str(prompt);
        Ok(text)
    }

    /// Consume the buffer, keeping the cleaned outputs
    pub fn into_entries(self) -> Vec<String> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_stores_cleaned_text() {
        let mut memory = MemoryBuffer::new();
        let cleaned = memory.record("<think>draft</think>Apple designs phones.");

        assert_eq!(cleaned, "Apple designs phones.");
        assert_eq!(memory.entries(), ["Apple designs phones."]);
        assert!(!memory.entries()[0].contains("<think>"));
    }

    #[test]
    fn test_first_submission_is_bare_prompt() {
        let catalog = PromptCatalog::new().unwrap();
        let memory = MemoryBuffer::new();
        assert_eq!(memory.submission(&catalog, "Overview?").unwrap(), "Overview?");
    }

    #[test]
    fn test_submission_carries_history() {
        let catalog = PromptCatalog::new().unwrap();
        let mut memory = MemoryBuffer::new();
        memory.record("<think>hmm</think>Strong brand.");
        memory.record("Healthy margins.");

        let text = memory.submission(&catalog, "Valuation?").unwrap();
        assert!(text.starts_with("Previous analysis:"));
        assert!(text.contains("Strong brand."));
        assert!(text.contains("Healthy margins."));
        assert!(!text.contains("hmm"));
        assert!(text.ends_with("\n\nValuation?"));
        assert_eq!(memory.len(), 2);
    }
}
