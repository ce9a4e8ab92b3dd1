//! The set of symbols the pipeline knows display names for

use crate::error::Result;
use crate::provider::{MarketDataProvider, UniverseEntry};
use std::collections::HashMap;
use tracing::info;

/// Immutable symbol -> company name lookup, kept in provider rank order
#[derive(Debug, Clone, Default)]
pub struct SymbolUniverse {
    entries: Vec<UniverseEntry>,
    index: HashMap<String, usize>,
}

impl SymbolUniverse {
    /// Load the `count` most active symbols from a provider
    pub async fn load(provider: &dyn MarketDataProvider, count: usize) -> Result<Self> {
        let universe = Self::from_entries(provider.most_active(count).await?);
        info!(provider = provider.name(), symbols = universe.len(), "Loaded symbol universe");
        Ok(universe)
    }

    /// Build from entries; a repeated symbol keeps its first entry
    pub fn from_entries(entries: impl IntoIterator<Item = UniverseEntry>) -> Self {
        let mut universe = Self::default();
        for entry in entries {
            let symbol = entry.symbol.to_uppercase();
            if universe.index.contains_key(&symbol) {
                continue;
            }
            universe.index.insert(symbol, universe.entries.len());
            universe.entries.push(entry);
        }
        universe
    }

    /// Display name for a symbol, case-insensitive
    pub fn name(&self, symbol: &str) -> Option<&str> {
        self.index
            .get(&symbol.to_uppercase())
            .map(|&i| self.entries[i].name.as_str())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(&symbol.to_uppercase())
    }

    /// Entries in provider rank order
    pub fn entries(&self) -> &[UniverseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
