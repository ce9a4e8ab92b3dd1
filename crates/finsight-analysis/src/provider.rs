//! Market-data provider abstraction

use crate::error::Result;
use crate::record::CompanyRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One listed symbol and its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub symbol: String,
    pub name: String,
}

impl UniverseEntry {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// Source of company data
///
/// Errors are reported as [`AnalysisError::Provider`] carrying the provider's
/// own message.
///
/// [`AnalysisError::Provider`]: crate::AnalysisError::Provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch summary data, statements and daily price history for `symbol`
    ///
    /// `history_range` is a Yahoo-style range such as `6mo`, `1y` or `5y`.
    async fn fetch_company(&self, symbol: &str, history_range: &str) -> Result<CompanyRecord>;

    /// The `count` most actively traded symbols, most active first
    async fn most_active(&self, count: usize) -> Result<Vec<UniverseEntry>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}
