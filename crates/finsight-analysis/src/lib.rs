//! Company analysis pipeline for finsight
//!
//! Turns market data for one company into a multi-section financial report:
//!
//! 1. A [`MarketDataProvider`] fetches a [`CompanyRecord`]
//! 2. Price history becomes a [`NormalizedSeries`] and statements become
//!    per-period ratios
//! 3. [`build_prompts`] renders one prompt per [`TemplateId`]
//! 4. A [`MemoryInvoker`] runs the prompts in order, feeding each prompt the
//!    cleaned outputs of the ones before it
//! 5. [`ReportWriter`] persists the cleaned outputs as markdown
//!
//! [`CompanyAnalyzer`] wires these steps together.
//!
//! # Example
//!
//! ```no_run
//! use finsight_analysis::{
//!     AnalysisConfig, CompanyAnalyzer, PromptCatalog, SymbolUniverse, YahooConfig, YahooProvider,
//! };
//! use finsight_llm::providers::OllamaProvider;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalysisConfig::from_env()?;
//! let market = Arc::new(YahooProvider::new(YahooConfig::default())?);
//! let universe = SymbolUniverse::load(market.as_ref(), config.universe_size).await?;
//! let llm = Arc::new(OllamaProvider::from_env()?);
//!
//! let analyzer = CompanyAnalyzer::new(market, llm, PromptCatalog::new()?, universe, config);
//! let result = analyzer.analyze("AAPL").await?;
//! println!("{}", result.report_path.display());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod api;
pub mod builder;
pub mod config;
pub mod error;
pub mod invoker;
pub mod memory;
pub mod metrics;
pub mod normalize;
pub mod prompts;
pub mod provider;
pub mod record;
pub mod report;
pub mod signals;
pub mod stripper;
pub mod universe;

pub use analyzer::{AnalysisResult, CompanyAnalyzer, Section};
pub use api::{YahooConfig, YahooProvider};
pub use builder::{PromptInputs, build_prompts};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, Result, Stage};
pub use invoker::{AnalysisEvent, AnalysisStream, MemoryInvoker};
pub use memory::MemoryBuffer;
pub use metrics::{PeriodMetrics, compute_financial_metrics};
pub use normalize::{NormalizedSeries, SeriesRow};
pub use prompts::{Prompt, PromptCatalog, PromptSequence, TemplateId};
pub use provider::{MarketDataProvider, UniverseEntry};
pub use record::{CompanyRecord, PriceBar, StatementRow};
pub use report::ReportWriter;
pub use signals::{Sentiment, Trend};
pub use stripper::strip_think;
pub use universe::SymbolUniverse;
