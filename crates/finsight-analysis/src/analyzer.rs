//! End-to-end company analysis

use crate::builder::{PromptInputs, build_prompts};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::invoker::{AnalysisEvent, AnalysisStream, MemoryInvoker};
use crate::normalize::NormalizedSeries;
use crate::prompts::{PromptCatalog, PromptSequence, TemplateId};
use crate::provider::MarketDataProvider;
use crate::report::ReportWriter;
use crate::universe::SymbolUniverse;
use chrono::{DateTime, Utc};
use finsight_llm::LLMProvider;
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One cleaned model output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub template: TemplateId,
    pub text: String,
}

/// Outcome of a completed blocking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run_id: Uuid,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    /// Cleaned outputs, one per prompt, in prompt order
    pub sections: Vec<Section>,
    pub report_path: PathBuf,
}

impl AnalysisResult {
    /// Section texts in prompt order
    pub fn outputs(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Fetches company data, builds the prompts and runs them through the model
///
/// Each call owns its own memory buffer, so one analyzer can serve concurrent
/// runs for different symbols.
pub struct CompanyAnalyzer {
    market: Arc<dyn MarketDataProvider>,
    invoker: MemoryInvoker,
    catalog: PromptCatalog,
    universe: SymbolUniverse,
    reports: ReportWriter,
    config: AnalysisConfig,
}

impl CompanyAnalyzer {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        llm: Arc<dyn LLMProvider>,
        catalog: PromptCatalog,
        universe: SymbolUniverse,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            invoker: MemoryInvoker::new(llm, catalog.clone(), &config),
            reports: ReportWriter::new(&config.output_dir),
            market,
            catalog,
            universe,
            config,
        }
    }

    /// Where the artifact for `symbol` is written
    pub fn report_path(&self, symbol: &str) -> PathBuf {
        self.reports.path(&normalize_symbol(symbol))
    }

    pub fn universe(&self) -> &SymbolUniverse {
        &self.universe
    }

    /// Run the full analysis, writing the artifact once every prompt is done
    ///
    /// If the model fails partway, the sections completed so far are still
    /// written before the error is returned.
    #[instrument(skip(self), fields(model = %self.config.model))]
    pub async fn analyze(&self, symbol: &str) -> Result<AnalysisResult> {
        let symbol = normalize_symbol(symbol);
        let prompts = self.prepare(&symbol).await?;

        let outputs = match self.invoker.run(&prompts).await {
            Ok(outputs) => outputs,
            Err(err) => {
                if let AnalysisError::Inference { completed, .. } = &err {
                    if let Err(write_err) = self.reports.write(&symbol, completed).await {
                        warn!(error = %write_err, "Failed to write partial report");
                    }
                }
                return Err(err);
            }
        };

        let report_path = self.reports.write(&symbol, &outputs).await?;
        info!(path = %report_path.display(), "Analysis complete");

        let sections = prompts
            .iter()
            .zip(outputs)
            .map(|(prompt, text)| Section {
                template: prompt.template,
                text,
            })
            .collect();

        Ok(AnalysisResult {
            run_id: Uuid::new_v4(),
            symbol,
            created_at: Utc::now(),
            sections,
            report_path,
        })
    }

    /// Run the analysis incrementally
    ///
    /// Data is fetched and prompts are built before this returns, so those
    /// failures surface here. The artifact is truncated up front and each
    /// section is appended as soon as it completes.
    #[instrument(skip(self), fields(model = %self.config.model))]
    pub async fn stream_analyze(&self, symbol: &str) -> Result<AnalysisStream> {
        let symbol = normalize_symbol(symbol);
        let prompts = self.prepare(&symbol).await?;
        let report = self.reports.create(&symbol).await?;
        let events = self.invoker.stream(prompts);

        Ok(Box::pin(stream::unfold(
            Some((events, report)),
            |state| async move {
                let (mut events, mut report) = state?;
                let event = match events.next().await? {
                    Ok(AnalysisEvent::SectionComplete {
                        index,
                        template,
                        text,
                    }) => {
                        if let Err(e) = report.append(&text).await {
                            return Some((Err(AnalysisError::from(e)), None));
                        }
                        Ok(AnalysisEvent::SectionComplete {
                            index,
                            template,
                            text,
                        })
                    }
                    Ok(AnalysisEvent::Completed) => {
                        info!(path = %report.path().display(), "Analysis complete");
                        Ok(AnalysisEvent::Completed)
                    }
                    other => other,
                };
                Some((event, Some((events, report))))
            },
        )))
    }

    async fn prepare(&self, symbol: &str) -> Result<PromptSequence> {
        let record = self
            .market
            .fetch_company(symbol, &self.config.history_range)
            .await?;
        let series = NormalizedSeries::from_prices(&record.history, &self.config)?;

        let inputs = PromptInputs {
            symbol,
            company_name: self.universe.name(symbol),
            record: &record,
            series: &series,
        };
        build_prompts(&inputs, &self.catalog, &self.config)
    }
}

impl std::fmt::Debug for CompanyAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanyAnalyzer")
            .field("market", &self.market.name())
            .field("invoker", &self.invoker)
            .field("universe", &self.universe.len())
            .finish_non_exhaustive()
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Stage;
    use crate::builder::tests::sample_record;
    use crate::invoker::tests::ScriptedProvider;
    use crate::provider::{MockMarketDataProvider, UniverseEntry};

    const RESPONSES: [&str; 6] = [
        "<think>who are they</think>Apple designs consumer hardware.",
        "Revenue is large and margins healthy.",
        "Liquidity is tight but cash flow is strong.",
        "<think>pe looks high</think>Richly valued.",
        "Analysts lean bullish.",
        "Hold.",
    ];

    fn market_returning(record: crate::CompanyRecord) -> MockMarketDataProvider {
        let mut market = MockMarketDataProvider::new();
        market
            .expect_fetch_company()
            .returning(move |_, _| Ok(record.clone()));
        market.expect_name().return_const("mock".to_string());
        market
    }

    fn analyzer(
        market: MockMarketDataProvider,
        llm: Arc<ScriptedProvider>,
        dir: &std::path::Path,
    ) -> CompanyAnalyzer {
        let config = AnalysisConfig::builder().output_dir(dir).build().unwrap();
        let universe =
            SymbolUniverse::from_entries([UniverseEntry::new("AAPL", "Apple Inc.")]);
        CompanyAnalyzer::new(
            Arc::new(market),
            llm,
            PromptCatalog::new().unwrap(),
            universe,
            config,
        )
    }

    #[tokio::test]
    async fn test_analyze_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(&RESPONSES));
        let analyzer = analyzer(market_returning(sample_record()), llm.clone(), dir.path());

        let result = analyzer.analyze("aapl").await.unwrap();

        assert_eq!(result.symbol, "AAPL");
        assert_eq!(result.sections.len(), 6);
        assert_eq!(result.sections[0].template, TemplateId::CompanyOverview);
        assert_eq!(result.outputs()[0], "Apple designs consumer hardware.");
        assert_eq!(result.outputs()[3], "Richly valued.");
        assert_eq!(result.report_path, dir.path().join("AAPL_analysis.md"));

        let written = std::fs::read_to_string(&result.report_path).unwrap();
        assert_eq!(written, result.outputs().join("\n"));
        assert!(!written.contains("<think>"));

        assert_eq!(llm.submissions().len(), 6);
        assert!(llm.submissions()[0].contains("AAPL: Apple Inc."));
    }

    #[tokio::test]
    async fn test_missing_field_stops_before_inference() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = sample_record();
        record.summary.remove("assetProfile");
        let llm = Arc::new(ScriptedProvider::new(&RESPONSES));
        let analyzer = analyzer(market_returning(record), llm.clone(), dir.path());

        let err = analyzer.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.stage(), Stage::PromptBuild);
        assert!(matches!(err, AnalysisError::MissingField { ref field, .. } if field == "assetProfile.industry"));
        assert!(llm.submissions().is_empty());
        assert!(!analyzer.report_path("AAPL").exists());
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let mut market = MockMarketDataProvider::new();
        market.expect_fetch_company().returning(|symbol, _| {
            Err(AnalysisError::Provider(format!("Quote not found for symbol: {symbol}")))
        });
        let analyzer = analyzer(market, Arc::new(ScriptedProvider::new(&RESPONSES)), dir.path());

        let err = analyzer.analyze("ZZZZ").await.unwrap_err();
        assert_eq!(err.stage(), Stage::DataFetch);
        assert_eq!(err.to_string(), "Quote not found for symbol: ZZZZ");
    }

    #[tokio::test]
    async fn test_inference_failure_keeps_partial_report() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(&RESPONSES).failing_at(3));
        let analyzer = analyzer(market_returning(sample_record()), llm, dir.path());

        let err = analyzer.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.stage(), Stage::Inference);

        let written = std::fs::read_to_string(analyzer.report_path("AAPL")).unwrap();
        assert_eq!(
            written,
            "Apple designs consumer hardware.\n\
             Revenue is large and margins healthy.\n\
             Liquidity is tight but cash flow is strong."
        );
    }

    #[tokio::test]
    async fn test_stream_analyze_appends_sections() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(&RESPONSES));
        let analyzer = analyzer(market_returning(sample_record()), llm, dir.path());

        let events: Vec<AnalysisEvent> = analyzer
            .stream_analyze("AAPL")
            .await
            .unwrap()
            .map(|event| event.unwrap())
            .collect()
            .await;

        let fragments: String = events
            .iter()
            .filter_map(|event| match event {
                AnalysisEvent::Fragment { index: 3, text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(fragments, RESPONSES[3]);
        assert_eq!(events.last(), Some(&AnalysisEvent::Completed));

        let sections: Vec<&str> = events
            .iter()
            .filter_map(|event| match event {
                AnalysisEvent::SectionComplete { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(sections.len(), 6);

        let written = std::fs::read_to_string(analyzer.report_path("AAPL")).unwrap();
        let expected: String = sections.iter().map(|s| format!("{s}\n")).collect();
        assert_eq!(written, expected);
    }

    #[tokio::test]
    async fn test_stream_failure_leaves_partial_report() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedProvider::new(&RESPONSES).failing_at(2));
        let analyzer = analyzer(market_returning(sample_record()), llm, dir.path());

        let results: Vec<Result<AnalysisEvent>> =
            analyzer.stream_analyze("AAPL").await.unwrap().collect().await;

        assert!(matches!(
            results.last(),
            Some(Err(AnalysisError::Inference { prompt: 2, .. }))
        ));
        assert!(!results.iter().any(|r| matches!(r, Ok(AnalysisEvent::Completed))));

        let written = std::fs::read_to_string(analyzer.report_path("AAPL")).unwrap();
        assert_eq!(
            written,
            "Apple designs consumer hardware.\nRevenue is large and margins healthy.\n"
        );
    }
}
