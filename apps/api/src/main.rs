mod config;
mod errors;
mod extraction;
mod impact;
mod ingest;
mod llm_client;
mod prediction;
mod retrieval;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extraction::ner::RuleBasedRecognizer;
use crate::impact::pipeline::ImpactPipeline;
use crate::ingest::loader::UrlLoader;
use crate::ingest::splitter::TextSplitter;
use crate::llm_client::LlmClient;
use crate::prediction::model::ImpactModel;
use crate::retrieval::qa::RetrievalQa;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Impact API v{}", env!("CARGO_PKG_VERSION"));

    // Load the regression model once; shared read-only from here on
    let model = Arc::new(ImpactModel::load(&config.model_path)?);

    let recognizer = Arc::new(
        RuleBasedRecognizer::new().context("Failed to compile entity recognizer patterns")?,
    );

    // Initialize OpenAI client (credential comes from the environment only)
    let llm = Arc::new(LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    ));
    info!(
        "LLM client initialized (completion: {}, embedding: {})",
        llm_client::COMPLETION_MODEL,
        llm_client::EMBEDDING_MODEL
    );

    let loader = Arc::new(UrlLoader::new(Duration::from_secs(config.fetch_timeout_secs))?);
    let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
    let qa = RetrievalQa::new(llm.clone(), llm, config.retrieval_top_k);
    info!(
        "Pipeline: chunk_size={} chunk_overlap={} top_k={}",
        config.chunk_size, config.chunk_overlap, config.retrieval_top_k
    );

    let pipeline = ImpactPipeline::new(loader, splitter, qa, recognizer, model);

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
