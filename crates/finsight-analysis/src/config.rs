//! Configuration for the analysis pipeline

use finsight_utils::{ConfigError, env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default model served by a local Ollama instance
pub const DEFAULT_MODEL: &str = "deepseek-r1:1.5b";

/// Tunables for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Trailing window (rows of defined returns) for rolling volatility
    pub volatility_window: usize,

    /// Trading days per year used to annualize volatility
    pub trading_days: u32,

    /// Short simple-moving-average window (default 50)
    pub short_window: usize,

    /// Long simple-moving-average window (default 200)
    pub long_window: usize,

    /// Ratio the short SMA mean must clear over the long one for a bullish call
    pub sentiment_threshold: f64,

    /// Calendar days of history the sentiment means are taken over
    pub sentiment_lookback_days: i64,

    /// Minimum share of defined fields a metrics period needs to be kept
    pub metrics_min_defined_ratio: f64,

    /// Price history range requested from the provider
    pub history_range: String,

    /// Number of most-active symbols loaded into the universe
    pub universe_size: usize,

    /// Directory the report artifacts are written to
    pub output_dir: PathBuf,

    /// Model identifier passed to the inference backend
    pub model: String,

    /// Generation cap per prompt; the backend default applies when unset
    pub max_tokens: Option<usize>,

    /// Sampling temperature; backend default when unset
    pub temperature: Option<f32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            volatility_window: 30,
            trading_days: 252,
            short_window: 50,
            long_window: 200,
            sentiment_threshold: 1.05,
            sentiment_lookback_days: 180,
            metrics_min_defined_ratio: 0.5,
            history_range: "1y".to_string(),
            universe_size: 250,
            output_dir: PathBuf::from("data"),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Defaults overlaid with `FINSIGHT_OUTPUT_DIR`, `FINSIGHT_MODEL` and
    /// `FINSIGHT_SENTIMENT_THRESHOLD` and `FINSIGHT_MAX_TOKENS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Some(dir) = env_string("FINSIGHT_OUTPUT_DIR") {
            builder = builder.output_dir(dir);
        }
        if let Some(model) = env_string("FINSIGHT_MODEL") {
            builder = builder.model(model);
        }
        if let Some(threshold) = env_parse::<f64>("FINSIGHT_SENTIMENT_THRESHOLD")? {
            builder = builder.sentiment_threshold(threshold);
        }
        if let Some(max_tokens) = env_parse::<usize>("FINSIGHT_MAX_TOKENS")? {
            builder = builder.max_tokens(max_tokens);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(key: &str, value: impl ToString, detail: &str) -> ConfigError {
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                detail: detail.to_string(),
            }
        }

        if self.volatility_window < 2 {
            return Err(invalid(
                "volatility_window",
                self.volatility_window,
                "sample deviation needs at least 2 rows",
            ));
        }
        if self.short_window == 0 || self.long_window == 0 {
            return Err(invalid(
                "sma_windows",
                format!("{}/{}", self.short_window, self.long_window),
                "moving-average windows must be greater than 0",
            ));
        }
        if self.trading_days == 0 {
            return Err(invalid("trading_days", self.trading_days, "must be greater than 0"));
        }
        if !(self.sentiment_threshold.is_finite() && self.sentiment_threshold > 0.0) {
            return Err(invalid(
                "sentiment_threshold",
                self.sentiment_threshold,
                "must be a positive number",
            ));
        }
        if self.sentiment_lookback_days <= 0 {
            return Err(invalid(
                "sentiment_lookback_days",
                self.sentiment_lookback_days,
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.metrics_min_defined_ratio) {
            return Err(invalid(
                "metrics_min_defined_ratio",
                self.metrics_min_defined_ratio,
                "must be within 0.0..=1.0",
            ));
        }
        if self.max_tokens == Some(0) {
            return Err(invalid("max_tokens", 0, "must be greater than 0 when set"));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model", &self.model, "must not be empty"));
        }
        Ok(())
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    volatility_window: Option<usize>,
    short_window: Option<usize>,
    long_window: Option<usize>,
    sentiment_threshold: Option<f64>,
    sentiment_lookback_days: Option<i64>,
    metrics_min_defined_ratio: Option<f64>,
    history_range: Option<String>,
    universe_size: Option<usize>,
    output_dir: Option<PathBuf>,
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
}

impl AnalysisConfigBuilder {
    /// Set the rolling volatility window
    pub fn volatility_window(mut self, window: usize) -> Self {
        self.volatility_window = Some(window);
        self
    }

    /// Set the short and long moving-average windows
    pub fn sma_windows(mut self, short: usize, long: usize) -> Self {
        self.short_window = Some(short);
        self.long_window = Some(long);
        self
    }

    /// Set the sentiment threshold
    pub fn sentiment_threshold(mut self, threshold: f64) -> Self {
        self.sentiment_threshold = Some(threshold);
        self
    }

    /// Set the sentiment lookback in calendar days
    pub fn sentiment_lookback_days(mut self, days: i64) -> Self {
        self.sentiment_lookback_days = Some(days);
        self
    }

    /// Set the minimum defined-field ratio for metrics periods
    pub fn metrics_min_defined_ratio(mut self, ratio: f64) -> Self {
        self.metrics_min_defined_ratio = Some(ratio);
        self
    }

    /// Set the price history range (e.g. "1y", "2y")
    pub fn history_range(mut self, range: impl Into<String>) -> Self {
        self.history_range = Some(range.into());
        self
    }

    /// Set the symbol universe size
    pub fn universe_size(mut self, size: usize) -> Self {
        self.universe_size = Some(size);
        self
    }

    /// Set the report output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the model identifier
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the per-prompt generation limit
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig, ConfigError> {
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            volatility_window: self.volatility_window.unwrap_or(defaults.volatility_window),
            trading_days: defaults.trading_days,
            short_window: self.short_window.unwrap_or(defaults.short_window),
            long_window: self.long_window.unwrap_or(defaults.long_window),
            sentiment_threshold: self.sentiment_threshold.unwrap_or(defaults.sentiment_threshold),
            sentiment_lookback_days: self
                .sentiment_lookback_days
                .unwrap_or(defaults.sentiment_lookback_days),
            metrics_min_defined_ratio: self
                .metrics_min_defined_ratio
                .unwrap_or(defaults.metrics_min_defined_ratio),
            history_range: self.history_range.unwrap_or(defaults.history_range),
            universe_size: self.universe_size.unwrap_or(defaults.universe_size),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            temperature: self.temperature.or(defaults.temperature),
        };

        config.validate()?;
        Ok(config)
    }
}
