//! The fixed set of analysis prompts
//!
//! Every analytical dimension has a [`TemplateId`] with a declared field list.
//! Fields with a `path` are read straight from the [`CompanyRecord`]; the rest
//! are derived by the prompt builder.
//!
//! [`CompanyRecord`]: crate::record::CompanyRecord

mod catalog;
mod templates;

pub use catalog::PromptCatalog;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a missing field fails the build or renders as `undefined`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// One template variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Variable name inside the template
    pub name: &'static str,
    /// Dotted record path, `None` for derived values
    pub path: Option<&'static str>,
    pub requirement: Requirement,
}

impl FieldSpec {
    const fn required(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path: Some(path),
            requirement: Requirement::Required,
        }
    }

    const fn optional(name: &'static str, path: &'static str) -> Self {
        Self {
            name,
            path: Some(path),
            requirement: Requirement::Optional,
        }
    }

    const fn derived(name: &'static str) -> Self {
        Self {
            name,
            path: None,
            requirement: Requirement::Required,
        }
    }

    /// Whether absence fails the build
    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

/// Analytical dimensions, in the order they are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemplateId {
    CompanyOverview,
    HealthCheck,
    FinancialStability,
    Valuation,
    MarketSentiment,
    DecisionMaking,
}

const OVERVIEW_FIELDS: &[FieldSpec] = &[
    FieldSpec::derived("company"),
    FieldSpec::required("industry", "assetProfile.industry"),
    FieldSpec::required("sector", "assetProfile.sector"),
    FieldSpec::required("current_price", "price.regularMarketPrice"),
    FieldSpec::optional("market_cap", "price.marketCap"),
    FieldSpec::derived("trend"),
];

const HEALTH_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("revenue", "financialData.totalRevenue"),
    FieldSpec::required("profit_margin", "financialData.profitMargins"),
    FieldSpec::derived("net_income"),
    FieldSpec::derived("eps_trend"),
    FieldSpec::optional("ebitda", "financialData.ebitda"),
    FieldSpec::optional("operating_margin", "financialData.operatingMargins"),
];

const STABILITY_FIELDS: &[FieldSpec] = &[FieldSpec::derived("metrics")];

const VALUATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::optional("pe_trailing", "summaryDetail.trailingPE"),
    FieldSpec::optional("pe_forward", "defaultKeyStatistics.forwardPE"),
    FieldSpec::optional("pb_ratio", "defaultKeyStatistics.priceToBook"),
    FieldSpec::derived("peg_ratio"),
    FieldSpec::optional("ev_ebitda", "defaultKeyStatistics.enterpriseToEbitda"),
    FieldSpec::optional("dividend_yield", "summaryDetail.dividendYield"),
    FieldSpec::optional("market_cap", "summaryDetail.marketCap"),
];

const SENTIMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("analyst_rating", "recommendationTrend.trend.0"),
    FieldSpec::derived("price_summary"),
    FieldSpec::derived("sentiment"),
];

impl TemplateId {
    /// All templates in run order
    pub const ALL: [TemplateId; 6] = [
        TemplateId::CompanyOverview,
        TemplateId::HealthCheck,
        TemplateId::FinancialStability,
        TemplateId::Valuation,
        TemplateId::MarketSentiment,
        TemplateId::DecisionMaking,
    ];

    /// Stable template name
    pub fn name(self) -> &'static str {
        match self {
            TemplateId::CompanyOverview => "company-overview",
            TemplateId::HealthCheck => "health-check",
            TemplateId::FinancialStability => "financial-stability",
            TemplateId::Valuation => "valuation",
            TemplateId::MarketSentiment => "market-sentiment",
            TemplateId::DecisionMaking => "decision-making",
        }
    }

    /// Human-readable section title
    pub fn title(self) -> &'static str {
        match self {
            TemplateId::CompanyOverview => "Company Overview",
            TemplateId::HealthCheck => "Health Check",
            TemplateId::FinancialStability => "Financial Stability",
            TemplateId::Valuation => "Valuation",
            TemplateId::MarketSentiment => "Market Sentiment",
            TemplateId::DecisionMaking => "Decision",
        }
    }

    /// Declared template variables
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            TemplateId::CompanyOverview => OVERVIEW_FIELDS,
            TemplateId::HealthCheck => HEALTH_FIELDS,
            TemplateId::FinancialStability => STABILITY_FIELDS,
            TemplateId::Valuation => VALUATION_FIELDS,
            TemplateId::MarketSentiment => SENTIMENT_FIELDS,
            TemplateId::DecisionMaking => &[],
        }
    }

    pub(crate) fn default_source(self) -> &'static str {
        match self {
            TemplateId::CompanyOverview => templates::COMPANY_OVERVIEW,
            TemplateId::HealthCheck => templates::HEALTH_CHECK,
            TemplateId::FinancialStability => templates::FINANCIAL_STABILITY,
            TemplateId::Valuation => templates::VALUATION,
            TemplateId::MarketSentiment => templates::MARKET_SENTIMENT,
            TemplateId::DecisionMaking => templates::DECISION_MAKING,
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rendered prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub template: TemplateId,
    pub text: String,
}

/// Ordered prompts for one run, one per [`TemplateId`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSequence {
    prompts: Vec<Prompt>,
}

impl PromptSequence {
    pub(crate) fn new(prompts: Vec<Prompt>) -> Self {
        Self { prompts }
    }

    /// Prompts in run order
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Number of prompts
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Whether the sequence is empty
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Iterate prompts in run order
    pub fn iter(&self) -> std::slice::Iter<'_, Prompt> {
        self.prompts.iter()
    }
}

impl IntoIterator for PromptSequence {
    type Item = Prompt;
    type IntoIter = std::vec::IntoIter<Prompt>;

    fn into_iter(self) -> Self::IntoIter {
        self.prompts.into_iter()
    }
}

impl<'a> IntoIterator for &'a PromptSequence {
    type Item = &'a Prompt;
    type IntoIter = std::slice::Iter<'a, Prompt>;

    fn into_iter(self) -> Self::IntoIter {
        self.prompts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_run_order() {
        let names: Vec<&str> = TemplateId::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "company-overview",
                "health-check",
                "financial-stability",
                "valuation",
                "market-sentiment",
                "decision-making"
            ]
        );
    }

    #[test]
    fn test_field_names_unique_per_template() {
        for id in TemplateId::ALL {
            let names: HashSet<&str> = id.fields().iter().map(|f| f.name).collect();
            assert_eq!(names.len(), id.fields().len(), "duplicate field in {id}");
        }
    }

    #[test]
    fn test_decision_has_no_fields() {
        assert!(TemplateId::DecisionMaking.fields().is_empty());
        assert!(
            TemplateId::Valuation
                .fields()
                .iter()
                .all(|f| f.path.is_none() || !f.is_required())
        );
    }
}
