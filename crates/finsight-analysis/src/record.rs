//! Raw company data as fetched from a market-data provider

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Period type Yahoo uses for trailing-twelve-month statement rows
pub const TRAILING_PERIOD: &str = "TTM";

/// One daily price bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Bar with only a close price, the other fields mirroring it
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }
}

/// One reporting period of a financial statement
///
/// Line items missing from `values` are undefined for that period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    pub as_of_date: NaiveDate,
    pub period_type: String,
    pub values: BTreeMap<String, f64>,
}

impl StatementRow {
    /// Create an empty row
    pub fn new(as_of_date: NaiveDate, period_type: impl Into<String>) -> Self {
        Self {
            as_of_date,
            period_type: period_type.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style line item insert
    pub fn with(mut self, item: impl Into<String>, value: f64) -> Self {
        self.values.insert(item.into(), value);
        self
    }

    /// Value of a line item, `None` when absent or not finite
    pub fn get(&self, item: &str) -> Option<f64> {
        self.values.get(item).copied().filter(|v| v.is_finite())
    }

    /// Whether this is a trailing-twelve-month row
    pub fn is_trailing(&self) -> bool {
        self.period_type == TRAILING_PERIOD
    }
}

/// Everything the pipeline knows about one company for one run
///
/// `summary` maps a category name (`assetProfile`, `price`, `financialData`,
/// ...) to that category's data, exactly as the provider returned it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub symbol: String,
    pub summary: Map<String, Value>,
    pub income_statement: Vec<StatementRow>,
    pub balance_sheet: Vec<StatementRow>,
    pub cash_flow: Vec<StatementRow>,
    pub history: Vec<PriceBar>,
}

impl CompanyRecord {
    /// Create an empty record for a symbol
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Look up a dotted path such as `price.regularMarketPrice` or
    /// `recommendationTrend.trend.0`
    ///
    /// Numeric segments index into arrays. Yahoo's `{ "raw": .., "fmt": .. }`
    /// wrappers resolve to their raw value. JSON `null` and empty wrappers
    /// count as absent.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.summary.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        unwrap_raw(current)
    }

    /// Numeric value at `path`, `None` when absent or non-numeric
    pub fn number(&self, path: &str) -> Option<f64> {
        self.field(path)?.as_f64().filter(|v| v.is_finite())
    }

    /// Text value at `path`, `None` when absent or blank
    pub fn text(&self, path: &str) -> Option<&str> {
        self.field(path)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn unwrap_raw(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.contains_key("raw") || map.contains_key("fmt") => {
            map.get("raw").filter(|raw| !raw.is_null())
        }
        Value::Object(map) if map.is_empty() => None,
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> CompanyRecord {
        let mut record = CompanyRecord::new("AAPL");
        let summary = json!({
            "price": {
                "regularMarketPrice": { "raw": 227.48, "fmt": "227.48" },
                "shortName": "Apple Inc.",
                "marketCap": null
            },
            "summaryDetail": { "dividendYield": {} },
            "recommendationTrend": {
                "trend": [{ "period": "0m", "strongBuy": 8, "buy": 24 }]
            }
        });
        if let Value::Object(map) = summary {
            record.summary = map;
        }
        record
    }

    #[test]
    fn test_field_unwraps_raw_values() {
        let record = record();
        assert_eq!(record.number("price.regularMarketPrice"), Some(227.48));
        assert_eq!(record.text("price.shortName"), Some("Apple Inc."));
    }

    #[test]
    fn test_field_indexes_arrays() {
        let record = record();
        let trend = record.field("recommendationTrend.trend.0").unwrap();
        assert_eq!(trend["strongBuy"], 8);
        assert!(record.field("recommendationTrend.trend.1").is_none());
    }

    #[test]
    fn test_null_and_empty_are_absent() {
        let record = record();
        assert!(record.field("price.marketCap").is_none());
        assert!(record.field("summaryDetail.dividendYield").is_none());
        assert!(record.field("assetProfile.sector").is_none());
        assert!(record.number("price.shortName").is_none());
    }

    #[test]
    fn test_statement_row() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 28).unwrap();
        let row = StatementRow::new(date, "3M")
            .with("TotalDebt", 119.0e9)
            .with("Inventory", f64::NAN);

        assert_eq!(row.get("TotalDebt"), Some(119.0e9));
        assert_eq!(row.get("Inventory"), None);
        assert_eq!(row.get("CurrentDebt"), None);
        assert!(!row.is_trailing());
        assert!(StatementRow::new(date, TRAILING_PERIOD).is_trailing());
    }
}
