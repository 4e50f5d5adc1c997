//! `research` — run the market research agents from a terminal.
//!
//! ```
//! research analyze vertical "electric vehicles" --table
//! research mergers "cloud security" "last 3 years"
//! research document report.pdf "What is the 2030 market size?"
//! ```

use clap::{Parser, Subcommand};
use market_research_intel::{
    agents::{AnalysisKind, MarketResearcher},
    config::AppConfig,
    documents::DocumentProcessor,
    llm::{LanguageModel, OpenAiClient},
    markdown,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "research", about = "Market research agents on the command line")]
struct Args {
    /// Model for inline-prompt agents (overrides DEFAULT_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// Print the first markdown table as parsed rows instead of raw text.
    #[arg(long, global = true)]
    table: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one analysis agent, e.g. `global`, `vertical`, `end-user`.
    Analyze { kind: AnalysisKind, market: String },
    /// Recent mergers and acquisitions in a market.
    Mergers { market: String, timeframe: String },
    /// Web research summary for a free-form query.
    Web { query: String },
    /// Top companies in a sub-market.
    Companies { submarket: String },
    /// Detailed metrics for a market.
    Metrics { market: String },
    /// Split a PDF, upload it and ask a question of every page range.
    Document { path: PathBuf, query: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(model) = args.model {
        config.default_model = model;
    }

    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&config)?);
    let researcher = MarketResearcher::from_config(model.clone(), &config);

    let output = match args.command {
        Command::Analyze { kind, market } => {
            info!("Running {} analysis for {}", kind, market);
            researcher.analyze(kind, &market).await
        }
        Command::Mergers { market, timeframe } => researcher.mergers(&market, &timeframe).await,
        Command::Web { query } => researcher.web_insights(&query).await,
        Command::Companies { submarket } => researcher.top_companies(&submarket).await?,
        Command::Metrics { market } => researcher.detailed_metrics(&market).await?,
        Command::Document { path, query } => {
            let bytes = tokio::fs::read(&path).await?;
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("document")
                .to_string();

            let documents = DocumentProcessor::from_config(model, &config);
            let chunks = documents.split_and_upload(&name, bytes).await?;
            info!("Uploaded {} chunk(s)", chunks.len());
            documents.query_chunks(&query, &chunks).await
        }
    };

    if args.table {
        print_table(&output);
    } else {
        println!("{}", markdown::extract_links(&output));
    }

    Ok(())
}

fn print_table(output: &str) {
    match markdown::first_table(output) {
        Some(table) if !table.is_empty() => {
            println!("{}", table.headers.join("\t"));
            for row in &table.rows {
                println!("{}", markdown::extract_links(&row.join("\t")));
            }
        }
        _ => println!("{}", output),
    }
}
