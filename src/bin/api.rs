use market_research_intel::{
    api::{start_server, ApiState},
    config::AppConfig,
    documents::DocumentProcessor,
    llm::{LanguageModel, OpenAiClient},
    agents::MarketResearcher,
    store::ResearchStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    info!("Market Research Intelligence - API Server");
    info!("Port: {}", config.port);
    info!("Database: {}", config.database_url);

    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiClient::from_config(&config)?);
    let store = ResearchStore::connect(&config.database_url).await?;

    let state = ApiState {
        store,
        researcher: Arc::new(MarketResearcher::from_config(model.clone(), &config)),
        documents: Arc::new(DocumentProcessor::from_config(model, &config)),
    };

    info!("Database initialized, starting API server");

    start_server(state, config.port).await?;

    Ok(())
}
