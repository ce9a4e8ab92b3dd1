//! Shared utilities for finsight
//!
//! This crate provides common functionality used across the finsight workspace,
//! including logging setup and environment-driven configuration helpers.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, env_parse, env_string};
pub use logging::{init_tracing, init_tracing_with_default};
