//! Price history normalization
//!
//! Turns raw daily bars into a [`NormalizedSeries`]: daily returns, annualized
//! rolling volatility and two simple moving averages. Every derived column is
//! `None` until its window is full, never a partial-window estimate.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::record::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ta::indicators::{SimpleMovingAverage, StandardDeviation};
use ta::{Next, Reset};

/// One normalized row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub date: NaiveDate,
    pub close: f64,
    /// Fractional change of close versus the prior row
    pub daily_return: Option<f64>,
    /// Annualized sample deviation of `daily_return` over the volatility window
    pub rolling_volatility: Option<f64>,
    /// Mean close over the short window (50 rows by default)
    pub sma_short: Option<f64>,
    /// Mean close over the long window (200 rows by default)
    pub sma_long: Option<f64>,
}

/// Ordered, immutable normalized price history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSeries {
    rows: Vec<SeriesRow>,
}

impl NormalizedSeries {
    /// Normalize price bars, ordering them by date first
    pub fn from_prices(bars: &[PriceBar], config: &AnalysisConfig) -> Result<Self> {
        let mut bars: Vec<&PriceBar> = bars.iter().collect();
        bars.sort_by_key(|bar| bar.date);

        let mut sma_short = WindowedMean::new(config.short_window)?;
        let mut sma_long = WindowedMean::new(config.long_window)?;
        let mut volatility = RollingVolatility::new(config.volatility_window, config.trading_days)?;

        let mut rows = Vec::with_capacity(bars.len());
        let mut previous: Option<f64> = None;
        for bar in bars {
            let daily_return = previous.and_then(|prev| percent_change(prev, bar.close));
            previous = Some(bar.close);

            rows.push(SeriesRow {
                date: bar.date,
                close: bar.close,
                daily_return,
                rolling_volatility: volatility.next(daily_return),
                sma_short: sma_short.next(bar.close),
                sma_long: sma_long.next(bar.close),
            });
        }

        Ok(Self { rows })
    }

    /// All rows, oldest first
    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Date of the most recent row
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|row| row.date)
    }
}

fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some(current / previous - 1.0).filter(|r| r.is_finite())
}

/// SMA that reports nothing until `window` values have been seen
struct WindowedMean {
    sma: SimpleMovingAverage,
    window: usize,
    seen: usize,
}

impl WindowedMean {
    fn new(window: usize) -> Result<Self> {
        let sma = SimpleMovingAverage::new(window)
            .map_err(|e| AnalysisError::Normalization(format!("SMA({window}): {e}")))?;
        Ok(Self {
            sma,
            window,
            seen: 0,
        })
    }

    fn next(&mut self, value: f64) -> Option<f64> {
        let mean = self.sma.next(value);
        self.seen += 1;
        (self.seen >= self.window).then_some(mean)
    }
}

/// Rolling sample deviation over consecutive defined returns
///
/// An undefined return restarts the window, so a gap keeps the next `window`
/// rows undefined.
struct RollingVolatility {
    deviation: StandardDeviation,
    window: usize,
    streak: usize,
    annualize: f64,
    sample_correction: f64,
}

impl RollingVolatility {
    fn new(window: usize, trading_days: u32) -> Result<Self> {
        if window < 2 {
            return Err(AnalysisError::Normalization(format!(
                "volatility window must cover at least 2 rows, got {window}"
            )));
        }
        let deviation = StandardDeviation::new(window)
            .map_err(|e| AnalysisError::Normalization(format!("SD({window}): {e}")))?;
        let n = window as f64;
        Ok(Self {
            deviation,
            window,
            streak: 0,
            annualize: f64::from(trading_days).sqrt(),
            sample_correction: (n / (n - 1.0)).sqrt(),
        })
    }

    fn next(&mut self, daily_return: Option<f64>) -> Option<f64> {
        let Some(value) = daily_return else {
            self.deviation.reset();
            self.streak = 0;
            return None;
        };

        let population = self.deviation.next(value);
        self.streak += 1;
        (self.streak >= self.window)
            .then(|| population * self.sample_correction * self.annualize)
    }
}
