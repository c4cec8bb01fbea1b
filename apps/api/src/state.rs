use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::ingest::resume_fetch::ResumeSource;
use crate::ingest::scoring::CandidateScorer;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub config: Config,
    /// Pluggable match scorer. Default: LlmCandidateScorer.
    pub scorer: Arc<dyn CandidateScorer>,
    /// Where resume PDFs are fetched from. Default: HttpResumeSource.
    pub resumes: Arc<dyn ResumeSource>,
}
