//! Classifications derived from market data

use crate::metrics::UNDEFINED;
use crate::normalize::NormalizedSeries;
use chrono::{Duration, NaiveDate};
use finsight_prompt::PromptBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of the latest session's price change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Neutral,
}

impl Trend {
    /// Classify a regular-market price change
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Trend::Uptrend
        } else if change < 0.0 {
            Trend::Downtrend
        } else {
            Trend::Neutral
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Uptrend => "Uptrend",
            Trend::Downtrend => "Downtrend",
            Trend::Neutral => "Neutral",
        })
    }
}

/// Moving-average crossover sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// Compare the short-window mean against the long-window mean
    pub fn classify(mean_short: f64, mean_long: f64, threshold: f64) -> Self {
        if mean_short > mean_long * threshold {
            Sentiment::Bullish
        } else if threshold * mean_short < mean_long {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }

    /// Sentiment over the `lookback_days` ending at the series' last date
    ///
    /// Means skip undefined rows. If either mean has no defined rows to
    /// average, the result is `Neutral`.
    pub fn from_series(series: &NormalizedSeries, lookback_days: i64, threshold: f64) -> Self {
        let Some(end) = series.last_date() else {
            return Sentiment::Neutral;
        };
        let start = end - Duration::days(lookback_days);
        let window = series.rows().iter().filter(|row| row.date >= start);

        let (short, long): (Vec<f64>, Vec<f64>) = window
            .map(|row| (row.sma_short, row.sma_long))
            .fold((Vec::new(), Vec::new()), |(mut s, mut l), (a, b)| {
                s.extend(a);
                l.extend(b);
                (s, l)
            });

        match (mean(&short), mean(&long)) {
            (Some(short), Some(long)) => Self::classify(short, long, threshold),
            _ => Sentiment::Neutral,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sentiment::Bullish => "Bullish",
            Sentiment::Bearish => "Bearish",
            Sentiment::Neutral => "Neutral",
        })
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// A fully defined `(date, close, return, volatility)` observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub date: NaiveDate,
    pub close: f64,
    pub daily_return: f64,
    pub rolling_volatility: f64,
}

/// Rows of the series where close, return and volatility are all defined
pub fn filtered_summary(series: &NormalizedSeries) -> Vec<SummaryRow> {
    series
        .rows()
        .iter()
        .filter_map(|row| {
            Some(SummaryRow {
                date: row.date,
                close: row.close,
                daily_return: row.daily_return?,
                rolling_volatility: row.rolling_volatility?,
            })
        })
        .collect()
}

/// Render summary rows one per line, or `undefined` when empty
pub fn describe_summary(rows: &[SummaryRow]) -> String {
    if rows.is_empty() {
        return UNDEFINED.to_string();
    }
    PromptBuilder::new()
        .bullets(rows.iter().map(|row| {
            format!(
                "{}: close {:.2}, return {:.2}%, volatility {:.2}%",
                row.date,
                row.close,
                row.daily_return * 100.0,
                row.rolling_volatility * 100.0
            )
        }))
        .build_trimmed()
}
