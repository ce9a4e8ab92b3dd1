//! Configuration management utilities

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed
    #[error("Environment variable {key} has invalid value '{value}': {detail}")]
    InvalidValue {
        key: String,
        value: String,
        detail: String,
    },
}

/// Read a non-empty string variable from the environment
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable from the environment
///
/// Returns `Ok(None)` when the variable is unset or blank.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                detail: e.to_string(),
            }),
    }
}

/// Process-level configuration shared by the binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, ...)
    pub environment: String,
    /// Default tracing directive used when `RUST_LOG` is not set
    pub log_directive: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "finsight".to_string(),
            environment: "development".to_string(),
            log_directive: "warn,finsight_analysis=info,finsight_cli=info".to_string(),
        }
    }
}

impl Config {
    /// Build from defaults overlaid with `FINSIGHT_ENV` and `FINSIGHT_LOG`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_name: defaults.app_name,
            environment: env_string("FINSIGHT_ENV").unwrap_or(defaults.environment),
            log_directive: env_string("FINSIGHT_LOG").unwrap_or(defaults.log_directive),
        }
    }
}
