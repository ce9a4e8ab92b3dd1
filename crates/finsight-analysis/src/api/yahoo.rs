//! Yahoo Finance market-data provider
//!
//! Price history goes through `yahoo_finance_api`. Summary modules, quarterly
//! statements and the most-actives screener are plain JSON endpoints that need
//! a session cookie and crumb, fetched once and refreshed when Yahoo rejects
//! them.

use crate::error::{AnalysisError, Result};
use crate::provider::{MarketDataProvider, UniverseEntry};
use crate::record::{CompanyRecord, PriceBar, StatementRow};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use finsight_utils::{ConfigError, env_parse};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const SESSION_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const TIMESERIES_URL: &str =
    "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries";
const SCREENER_URL: &str = "https://query1.finance.yahoo.com/v1/finance/screener/predefined/saved";

const SUMMARY_MODULES: &[&str] = &[
    "assetProfile",
    "price",
    "financialData",
    "summaryDetail",
    "defaultKeyStatistics",
    "recommendationTrend",
];

const FREQUENCY: &str = "quarterly";
const INCOME_ITEMS: &[&str] = &["BasicEPS", "DilutedEPS", "TotalRevenue", "NetIncome"];
const BALANCE_ITEMS: &[&str] = &[
    "TotalDebt",
    "StockholdersEquity",
    "CurrentAssets",
    "CurrentLiabilities",
    "Inventory",
    "TotalAssets",
    "TotalLiabilitiesNetMinorityInterest",
    "CurrentDebt",
    "LongTermDebt",
];
const CASH_FLOW_ITEMS: &[&str] = &["OperatingCashFlow", "CapitalExpenditure", "FreeCashFlow"];

/// Statement history requested from the timeseries endpoint
const STATEMENT_YEARS: i64 = 5;
/// The screener caps a single page at this many quotes
const SCREENER_MAX_COUNT: usize = 250;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration for [`YahooProvider`]
#[derive(Debug, Clone)]
pub struct YahooConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Requests allowed per minute across all Yahoo endpoints
    pub requests_per_minute: u32,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            requests_per_minute: 60,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl YahooConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `YAHOO_TIMEOUT_SECS` and
    /// `YAHOO_REQUESTS_PER_MINUTE`
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(timeout) = env_parse::<u64>("YAHOO_TIMEOUT_SECS")? {
            config.timeout_secs = timeout;
        }
        if let Some(rate) = env_parse::<u32>("YAHOO_REQUESTS_PER_MINUTE")? {
            config.requests_per_minute = rate;
        }
        Ok(config)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the rate limit
    pub fn with_requests_per_minute(mut self, requests: u32) -> Self {
        self.requests_per_minute = requests;
        self
    }
}

#[derive(Debug, Clone)]
struct Session {
    cookie: String,
    crumb: String,
}

/// Yahoo Finance provider
pub struct YahooProvider {
    client: Client,
    rate_limiter: SharedRateLimiter,
    session: Mutex<Option<Session>>,
}

impl YahooProvider {
    /// Create a provider with the given configuration
    pub fn new(config: YahooConfig) -> Result<Self> {
        let rate = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            AnalysisError::Provider("Yahoo rate limit must be at least 1 request per minute".into())
        })?;
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|_| AnalysisError::Provider("invalid user agent".to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(provider_error)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(rate))),
            session: Mutex::new(None),
        })
    }

    /// Create a provider from environment variables
    pub fn from_env() -> Result<Self> {
        let config = YahooConfig::from_env().map_err(|e| AnalysisError::Provider(e.to_string()))?;
        Self::new(config)
    }

    async fn session(&self) -> Result<Session> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        self.rate_limiter.until_ready().await;
        // fc.yahoo.com answers 404 but still sets the session cookie
        let response = self
            .client
            .get(SESSION_URL)
            .send()
            .await
            .map_err(provider_error)?;
        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .collect::<Vec<_>>()
            .join("; ");
        if cookie.is_empty() {
            return Err(AnalysisError::Provider(
                "Yahoo did not issue a session cookie".to_string(),
            ));
        }

        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(CRUMB_URL)
            .header(COOKIE, &cookie)
            .send()
            .await
            .map_err(provider_error)?;
        let status = response.status();
        let crumb = response.text().await.map_err(provider_error)?;
        if !status.is_success() || crumb.trim().is_empty() || crumb.contains('{') {
            return Err(AnalysisError::Provider(format!(
                "Yahoo crumb request failed: HTTP {status}"
            )));
        }

        debug!("Established Yahoo session");
        let session = Session {
            cookie,
            crumb: crumb.trim().to_string(),
        };
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        for attempt in 0..2 {
            let session = self.session().await?;
            self.rate_limiter.until_ready().await;

            let response = self
                .client
                .get(url)
                .header(COOKIE, &session.cookie)
                .query(query)
                .query(&[("crumb", session.crumb.as_str())])
                .send()
                .await
                .map_err(provider_error)?;
            let status = response.status();
            let text = response.text().await.map_err(provider_error)?;

            if status == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!(url, "Yahoo rejected the session, refreshing");
                *self.session.lock().await = None;
                continue;
            }

            return match serde_json::from_str::<Value>(&text) {
                Ok(body) => Ok(body),
                Err(_) if !status.is_success() => Err(AnalysisError::Provider(format!(
                    "Yahoo request failed: HTTP {status}"
                ))),
                Err(e) => Err(AnalysisError::Provider(format!(
                    "Invalid Yahoo response: {e}"
                ))),
            };
        }
        Err(AnalysisError::Provider(
            "Yahoo rejected the session twice".to_string(),
        ))
    }

    async fn fetch_summary(&self, symbol: &str) -> Result<Map<String, Value>> {
        let url = format!("{QUOTE_SUMMARY_URL}/{symbol}");
        let body = self
            .get_json(&url, &[("modules", SUMMARY_MODULES.join(","))])
            .await?;
        parse_summary(&body, symbol)
    }

    async fn fetch_statements(&self, symbol: &str) -> Result<Vec<TimeseriesPoint>> {
        let end = Utc::now();
        let start = end - Duration::days(365 * STATEMENT_YEARS);
        let types = INCOME_ITEMS
            .iter()
            .chain(BALANCE_ITEMS)
            .chain(CASH_FLOW_ITEMS)
            .map(|item| format!("{FREQUENCY}{item}"))
            .collect::<Vec<_>>()
            .join(",");

        let url = format!("{TIMESERIES_URL}/{symbol}");
        let body = self
            .get_json(
                &url,
                &[
                    ("symbol", symbol.to_string()),
                    ("type", types),
                    ("period1", start.timestamp().to_string()),
                    ("period2", end.timestamp().to_string()),
                ],
            )
            .await?;
        parse_timeseries(&body)
    }

    async fn fetch_history(&self, symbol: &str, range: &str) -> Result<Vec<PriceBar>> {
        let end = Utc::now();
        let start = range_start(range, end)?;

        let to_offset = |dt: DateTime<Utc>| {
            OffsetDateTime::from_unix_timestamp(dt.timestamp())
                .map_err(|e| AnalysisError::Provider(format!("Invalid timestamp: {e}")))
        };

        self.rate_limiter.until_ready().await;
        let connector = yahoo::YahooConnector::new().map_err(provider_error)?;
        let response = connector
            .get_quote_history(symbol, to_offset(start)?, to_offset(end)?)
            .await
            .map_err(provider_error)?;
        let quotes = response.quotes().map_err(provider_error)?;

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let timestamp = i64::try_from(q.timestamp).ok()?;
                let date = DateTime::from_timestamp(timestamp, 0)?.date_naive();
                Some(PriceBar {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .filter(|bar| bar.close.is_finite())
            .collect())
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn fetch_company(&self, symbol: &str, history_range: &str) -> Result<CompanyRecord> {
        let summary = self.fetch_summary(symbol).await?;
        let points = self.fetch_statements(symbol).await?;
        let history = self.fetch_history(symbol, history_range).await?;

        let record = CompanyRecord {
            symbol: symbol.to_string(),
            summary,
            income_statement: statement_rows(&points, INCOME_ITEMS),
            balance_sheet: statement_rows(&points, BALANCE_ITEMS),
            cash_flow: statement_rows(&points, CASH_FLOW_ITEMS),
            history,
        };
        debug!(
            symbol,
            periods = record.balance_sheet.len(),
            bars = record.history.len(),
            "Fetched company data"
        );
        Ok(record)
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn most_active(&self, count: usize) -> Result<Vec<UniverseEntry>> {
        let body = self
            .get_json(
                SCREENER_URL,
                &[
                    ("scrIds", "most_actives".to_string()),
                    ("count", count.min(SCREENER_MAX_COUNT).to_string()),
                ],
            )
            .await?;
        parse_screener(&body)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

impl std::fmt::Debug for YahooProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YahooProvider").finish_non_exhaustive()
    }
}

fn provider_error(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Provider(e.to_string())
}

/// Unwrap `{ <root>: { result, error } }`, surfacing Yahoo's own error text
fn api_result<'a>(body: &'a Value, root: &str) -> Result<&'a Value> {
    let section = &body[root];
    if let Some(error) = section.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("description")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(AnalysisError::Provider(message));
    }
    section
        .get("result")
        .filter(|r| !r.is_null())
        .ok_or_else(|| AnalysisError::Provider(format!("Yahoo response has no {root} result")))
}

fn parse_summary(body: &Value, symbol: &str) -> Result<Map<String, Value>> {
    api_result(body, "quoteSummary")?
        .get(0)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| AnalysisError::Provider(format!("Quote not found for symbol: {symbol}")))
}

fn parse_screener(body: &Value) -> Result<Vec<UniverseEntry>> {
    let quotes = api_result(body, "finance")?
        .get(0)
        .and_then(|r| r.get("quotes"))
        .and_then(Value::as_array)
        .ok_or_else(|| AnalysisError::Provider("Screener response has no quotes".to_string()))?;

    Ok(quotes
        .iter()
        .filter_map(|quote| {
            let symbol = quote.get("symbol")?.as_str()?;
            let name = quote
                .get("shortName")
                .or_else(|| quote.get("longName"))
                .and_then(Value::as_str)?;
            Some(UniverseEntry::new(symbol, name))
        })
        .collect())
}

/// One statement line item for one period
#[derive(Debug, Clone, PartialEq)]
struct TimeseriesPoint {
    item: String,
    as_of_date: NaiveDate,
    period_type: String,
    value: f64,
}

fn parse_timeseries(body: &Value) -> Result<Vec<TimeseriesPoint>> {
    let series = api_result(body, "timeseries")?
        .as_array()
        .ok_or_else(|| AnalysisError::Provider("Timeseries result is not a list".to_string()))?;

    let mut points = Vec::new();
    for entry in series {
        let Some(key) = entry["meta"]["type"].get(0).and_then(Value::as_str) else {
            continue;
        };
        let Some(item) = key.strip_prefix(FREQUENCY) else {
            continue;
        };
        let Some(observations) = entry.get(key).and_then(Value::as_array) else {
            continue;
        };

        points.extend(observations.iter().filter_map(|obs| {
            let as_of_date = obs.get("asOfDate")?.as_str()?.parse::<NaiveDate>().ok()?;
            let value = obs.get("reportedValue")?.get("raw")?.as_f64()?;
            let period_type = obs
                .get("periodType")
                .and_then(Value::as_str)
                .unwrap_or("3M");
            Some(TimeseriesPoint {
                item: item.to_string(),
                as_of_date,
                period_type: period_type.to_string(),
                value,
            })
        }));
    }
    Ok(points)
}

/// Group the points for `items` into one row per period, oldest first
fn statement_rows(points: &[TimeseriesPoint], items: &[&str]) -> Vec<StatementRow> {
    let mut rows: BTreeMap<(NaiveDate, &str), StatementRow> = BTreeMap::new();
    for point in points.iter().filter(|p| items.contains(&p.item.as_str())) {
        rows.entry((point.as_of_date, point.period_type.as_str()))
            .or_insert_with(|| StatementRow::new(point.as_of_date, point.period_type.clone()))
            .values
            .insert(point.item.clone(), point.value);
    }
    rows.into_values().collect()
}

/// Start of a Yahoo-style history range ending at `end`
fn range_start(range: &str, end: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let days = match range {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 30,
        "3mo" => 90,
        "6mo" => 180,
        "1y" => 365,
        "2y" => 730,
        "5y" => 1825,
        "10y" => 3650,
        "ytd" => {
            return NaiveDate::from_ymd_opt(end.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .ok_or_else(|| AnalysisError::Provider(format!("Invalid range: {range}")));
        }
        "max" => 36500,
        _ => return Err(AnalysisError::Provider(format!("Invalid range: {range}"))),
    };
    Ok(end - Duration::days(days))
}
