//! Schema inference: asks the LLM which candidate columns a job posting needs.

use tracing::{info, warn};

use crate::ingest::prompts::COLUMNS_PROMPT_TEMPLATE;
use crate::llm_client::prompts::{fill_prompt, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{complete_json, TextCompleter};
use crate::tables::ident::{default_columns, normalize_columns};

/// Returns sanitized column names for the job's candidate table, always ending
/// with `score`. Falls back to the default columns instead of failing.
pub async fn infer_columns(llm: &dyn TextCompleter, jd_text: &str) -> Vec<String> {
    let prompt = fill_prompt(
        COLUMNS_PROMPT_TEMPLATE,
        &[("json_only", JSON_ONLY_INSTRUCTION), ("jd_text", jd_text)],
    );

    let raw = match complete_json::<Vec<String>>(llm, &prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to infer columns from JD, using defaults: {e}");
            return default_columns();
        }
    };

    let columns = normalize_columns(&raw);
    // Only `score` survived sanitizing
    if columns.len() <= 1 {
        warn!("LLM returned no usable columns ({raw:?}), using defaults");
        return default_columns();
    }

    info!("Inferred columns: {columns:?}");
    columns
}
