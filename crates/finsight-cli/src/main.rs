//! Command-line interface for finsight

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Table, presets::UTF8_FULL};
use finsight_analysis::{
    AnalysisConfig, AnalysisEvent, CompanyAnalyzer, PromptCatalog, SymbolUniverse, YahooProvider,
};
use finsight_llm::LLMProvider;
use finsight_llm::providers::{OllamaProvider, OpenAIProvider};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "finsight")]
#[command(about = "LLM-written financial analysis reports for listed companies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze one company and write its markdown report
    Analyze {
        /// Ticker symbol, e.g. AAPL
        symbol: String,

        /// Print model output as it is generated
        #[arg(short, long)]
        stream: bool,

        /// Inference backend
        #[arg(short, long, value_enum, default_value_t = Backend::Ollama)]
        provider: Backend,

        /// Model identifier; overrides FINSIGHT_MODEL
        #[arg(short, long)]
        model: Option<String>,

        /// Cap on generated tokens per section; overrides FINSIGHT_MAX_TOKENS
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// List the most actively traded symbols
    List {
        /// Number of symbols to show
        #[arg(short, long, default_value_t = 25)]
        count: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Local Ollama server (OLLAMA_HOST)
    Ollama,
    /// OpenAI-compatible API (OPENAI_API_KEY, OPENAI_API_BASE)
    Openai,
}

impl Backend {
    fn provider(self) -> anyhow::Result<Arc<dyn LLMProvider>> {
        Ok(match self {
            Backend::Ollama => Arc::new(OllamaProvider::from_env()?),
            Backend::Openai => Arc::new(OpenAIProvider::from_env()?),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = finsight_utils::Config::from_env();
    finsight_utils::init_tracing_with_default(&settings.log_directive);

    let cli = Cli::parse();
    info!(environment = %settings.environment, "Starting finsight");

    match cli.command {
        Commands::Analyze {
            symbol,
            stream,
            provider,
            model,
            max_tokens,
        } => analyze(&symbol, stream, provider, model, max_tokens).await,
        Commands::List { count } => list(count).await,
    }
}

async fn analyze(
    symbol: &str,
    stream: bool,
    backend: Backend,
    model: Option<String>,
    max_tokens: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = AnalysisConfig::from_env()?;
    if let Some(model) = model {
        config.model = model;
    }
    if max_tokens.is_some() {
        config.max_tokens = max_tokens;
    }
    config.validate()?;

    let market = Arc::new(YahooProvider::from_env()?);
    let universe = SymbolUniverse::load(market.as_ref(), config.universe_size)
        .await
        .context("failed to load symbol universe")?;
    if !universe.contains(symbol) {
        warn!(symbol, "Symbol is not among the most active; falling back to the quote name");
    }

    let analyzer = CompanyAnalyzer::new(
        market,
        backend.provider()?,
        PromptCatalog::new()?,
        universe,
        config,
    );

    if !stream {
        let result = analyzer.analyze(symbol).await?;
        println!("{}", result.report_path.display());
        return Ok(());
    }

    let mut events = analyzer.stream_analyze(symbol).await?;
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event? {
            AnalysisEvent::Fragment { text, .. } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            AnalysisEvent::SectionComplete { template, .. } => {
                writeln!(stdout, "\n\n--- {} complete ---\n", template.title())?;
            }
            AnalysisEvent::Completed => {
                println!("{}", analyzer.report_path(symbol).display());
            }
        }
    }

    Ok(())
}

async fn list(count: usize) -> anyhow::Result<()> {
    let market = YahooProvider::from_env()?;
    let universe = SymbolUniverse::load(&market, count).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["#", "Symbol", "Name"]);
    for (rank, entry) in universe.entries().iter().enumerate() {
        table.add_row(vec![
            (rank + 1).to_string(),
            entry.symbol.clone(),
            entry.name.clone(),
        ]);
    }

    println!("{table}");
    Ok(())
}
