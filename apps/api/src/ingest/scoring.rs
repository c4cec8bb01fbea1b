//! Match scoring: pluggable scorer rating a candidate against a job description.
//!
//! `AppState` holds an `Arc<dyn CandidateScorer>`; the default backend asks the LLM.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::ingest::extraction::CandidateRecord;
use crate::ingest::prompts::SCORE_PROMPT_TEMPLATE;
use crate::llm_client::prompts::fill_prompt;
use crate::llm_client::{strip_json_fences, LlmError, TextCompleter};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM returned a non-numeric score: {0:?}")]
    NotANumber(String),

    #[error("failed to serialize candidate: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait CandidateScorer: Send + Sync {
    /// Returns a match score in `[MIN_SCORE, MAX_SCORE]`.
    async fn score(&self, candidate: &CandidateRecord, jd_text: &str) -> Result<f64, ScoreError>;
}

/// Default scorer: one LLM call per candidate.
pub struct LlmCandidateScorer {
    llm: Arc<dyn TextCompleter>,
}

impl LlmCandidateScorer {
    pub fn new(llm: Arc<dyn TextCompleter>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CandidateScorer for LlmCandidateScorer {
    async fn score(&self, candidate: &CandidateRecord, jd_text: &str) -> Result<f64, ScoreError> {
        // Sorted keys keep the prompt stable across runs
        let ordered: std::collections::BTreeMap<_, _> = candidate.iter().collect();
        let candidate_json = serde_json::to_string(&ordered)?;
        let prompt = fill_prompt(
            SCORE_PROMPT_TEMPLATE,
            &[("candidate_json", candidate_json.as_str()), ("jd_text", jd_text)],
        );

        let reply = self.llm.complete(&prompt).await?;
        debug!("Raw score reply: {reply:?}");
        parse_score(&reply)
    }
}

/// Parses the model's score reply, clamping into range.
pub fn parse_score(reply: &str) -> Result<f64, ScoreError> {
    let text = strip_json_fences(reply).trim_end_matches('%').trim();
    let score: f64 = text
        .parse()
        .map_err(|_| ScoreError::NotANumber(reply.to_string()))?;
    if !score.is_finite() {
        return Err(ScoreError::NotANumber(reply.to_string()));
    }
    Ok(score.clamp(MIN_SCORE, MAX_SCORE))
}

/// Formats a score for the TEXT `score` column.
pub fn format_score(score: f64) -> String {
    format!("{score:.1}")
}
