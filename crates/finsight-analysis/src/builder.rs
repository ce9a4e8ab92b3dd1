//! Company data to an ordered prompt sequence

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::metrics::{
    UNDEFINED, compute_financial_metrics, describe_eps_trend, describe_metrics, divide, eps_trend,
};
use crate::normalize::NormalizedSeries;
use crate::prompts::{FieldSpec, Prompt, PromptCatalog, PromptSequence, TemplateId};
use crate::record::CompanyRecord;
use crate::signals::{Sentiment, Trend, describe_summary, filtered_summary};
use serde_json::{Map, Value};
use tracing::debug;

const SHORT_NAME: &str = "price.shortName";
const MARKET_CHANGE: &str = "price.regularMarketChange";
const EARNINGS_GROWTH: &str = "defaultKeyStatistics.earningsQuarterlyGrowth";

/// Everything one prompt build reads
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub symbol: &'a str,
    /// Display name from the symbol universe, if the symbol is listed there
    pub company_name: Option<&'a str>,
    pub record: &'a CompanyRecord,
    pub series: &'a NormalizedSeries,
}

/// Build the six analysis prompts in run order
///
/// Fails with [`AnalysisError::MissingField`] on the first required field
/// that is absent or null. Optional fields render as `undefined`.
pub fn build_prompts(
    inputs: &PromptInputs<'_>,
    catalog: &PromptCatalog,
    config: &AnalysisConfig,
) -> Result<PromptSequence> {
    let mut prompts = Vec::with_capacity(TemplateId::ALL.len());
    for id in TemplateId::ALL {
        let vars = template_vars(id, inputs, config)?;
        let text = catalog.render(id, &vars)?;
        debug!(template = %id, chars = text.len(), "Rendered prompt");
        prompts.push(Prompt { template: id, text });
    }
    Ok(PromptSequence::new(prompts))
}

fn template_vars(
    id: TemplateId,
    inputs: &PromptInputs<'_>,
    config: &AnalysisConfig,
) -> Result<Map<String, Value>> {
    let mut vars = Map::new();
    for field in id.fields() {
        let value = match field.path {
            Some(path) => record_value(id, field, path, inputs.record)?,
            None => derived_value(id, field.name, inputs, config)?,
        };
        vars.insert(field.name.to_string(), value);
    }
    Ok(vars)
}

fn record_value(
    id: TemplateId,
    field: &FieldSpec,
    path: &str,
    record: &CompanyRecord,
) -> Result<Value> {
    match record.field(path) {
        Some(Value::Object(map)) => Ok(Value::from(describe_object(map))),
        Some(value) => Ok(value.clone()),
        None if field.is_required() => Err(AnalysisError::missing(path, id.name())),
        None => Ok(Value::from(UNDEFINED)),
    }
}

fn derived_value(
    id: TemplateId,
    name: &str,
    inputs: &PromptInputs<'_>,
    config: &AnalysisConfig,
) -> Result<Value> {
    let record = inputs.record;
    let require = |path: &str| {
        record
            .number(path)
            .ok_or_else(|| AnalysisError::missing(path, id.name()))
    };

    let value = match name {
        "company" => {
            let label = match inputs.company_name {
                Some(name) => name,
                None => record
                    .text(SHORT_NAME)
                    .ok_or_else(|| AnalysisError::missing(SHORT_NAME, id.name()))?,
            };
            Value::from(format!("{}: {label}", inputs.symbol))
        }
        "trend" => Value::from(Trend::from_change(require(MARKET_CHANGE)?).to_string()),
        "net_income" => {
            let revenue = require("financialData.totalRevenue")?;
            let margin = require("financialData.profitMargins")?;
            Value::from(revenue * margin)
        }
        "eps_trend" => Value::from(describe_eps_trend(&eps_trend(&record.income_statement))),
        "metrics" => Value::from(describe_metrics(&compute_financial_metrics(
            &record.balance_sheet,
            &record.cash_flow,
            config.metrics_min_defined_ratio,
        ))),
        "peg_ratio" => divide(
            record.number("summaryDetail.trailingPE"),
            record.number(EARNINGS_GROWTH),
        )
        .map_or_else(|| Value::from(UNDEFINED), Value::from),
        "price_summary" => Value::from(describe_summary(&filtered_summary(inputs.series))),
        "sentiment" => Value::from(
            Sentiment::from_series(
                inputs.series,
                config.sentiment_lookback_days,
                config.sentiment_threshold,
            )
            .to_string(),
        ),
        other => return Err(AnalysisError::missing(other, id.name())),
    };
    Ok(value)
}

// Yahoo nests some fields (`recommendationTrend.trend.0`) as flat objects;
// render them as `key value` pairs instead of raw JSON.
fn describe_object(map: &Map<String, Value>) -> String {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::String(s) => format!("{k} {s}"),
            other => format!("{k} {other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
