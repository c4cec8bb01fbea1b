pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::ingest::handlers as ingest;
use crate::state::AppState;
use crate::tables::handlers as tables;

/// Candidate CSV plus job description PDF.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Ingestion
        .route("/newChat", post(ingest::handle_new_chat))
        // Querying
        .route("/chat", post(chat::handle_chat))
        .route("/gettables", get(tables::handle_get_tables))
        .route("/tables/:table_name", get(tables::handle_table_insights))
        .route("/rejected", get(tables::handle_get_rejected))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
