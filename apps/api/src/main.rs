mod chat;
mod config;
mod db;
mod errors;
mod ingest;
mod llm_client;
mod models;
mod routes;
mod state;
mod tables;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, init_schema};
use crate::ingest::resume_fetch::HttpResumeSource;
use crate::ingest::scoring::LlmCandidateScorer;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

/// Timeout for resume downloads; the LLM client has its own.
const RESUME_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

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

    info!("Starting screener API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    init_schema(&db).await?;

    // Initialize LLM client
    let llm = LlmClient::new(
        config.google_api_key.clone(),
        config.llm_model.clone(),
        config.llm_endpoint.clone(),
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    // Scorer and resume source share the LLM client / an HTTP client
    let scorer = Arc::new(LlmCandidateScorer::new(Arc::new(llm.clone())));
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(RESUME_DOWNLOAD_TIMEOUT_SECS))
        .build()?;
    let resumes = Arc::new(HttpResumeSource::new(http));

    // Build app state
    let state = AppState {
        db,
        llm,
        config: config.clone(),
        scorer,
        resumes,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // browser client is served from another origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
