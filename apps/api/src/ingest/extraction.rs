//! Field extraction: maps a resume onto the job's inferred columns via the LLM.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::ingest::prompts::EXTRACTION_PROMPT_TEMPLATE;
use crate::llm_client::prompts::{fill_prompt, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{strip_json_fences, LlmError, TextCompleter};
use crate::tables::ident::{sanitize_column_name, SCORE_COLUMN};

/// Column name → cell text for one candidate.
pub type CandidateRecord = HashMap<String, String>;

/// Extracts every non-score column from the resume. Unparseable LLM output
/// yields an all-empty record; only a failed LLM call is an error.
pub async fn extract_candidate_fields(
    llm: &dyn TextCompleter,
    resume_text: &str,
    jd_text: &str,
    columns: &[String],
) -> Result<CandidateRecord, LlmError> {
    let fields: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| *c != SCORE_COLUMN)
        .collect();

    let fields_list = fields.join(", ");
    let prompt = fill_prompt(
        EXTRACTION_PROMPT_TEMPLATE,
        &[
            ("json_only", JSON_ONLY_INSTRUCTION),
            ("fields", fields_list.as_str()),
            ("jd_text", jd_text),
            ("resume_text", resume_text),
        ],
    );

    let raw = llm.complete(&prompt).await?;
    debug!(
        "Raw LLM output for candidate fields: {}...",
        raw.chars().take(200).collect::<String>()
    );

    let parsed = match serde_json::from_str::<Value>(strip_json_fences(&raw)) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("Candidate extraction returned non-object JSON: {other}");
            serde_json::Map::new()
        }
        Err(e) => {
            warn!("Candidate extraction returned invalid JSON ({e}), storing empty fields");
            serde_json::Map::new()
        }
    };

    // Match LLM keys to columns by their sanitized form ("Full Name" -> full_name)
    let mut by_column: HashMap<String, String> = HashMap::new();
    for (key, value) in parsed {
        if let Some(column) = sanitize_column_name(&key) {
            by_column.entry(column).or_insert_with(|| render_value(&value));
        }
    }

    Ok(fields
        .into_iter()
        .map(|f| (f.to_string(), by_column.remove(f).unwrap_or_default()))
        .collect())
}

/// Renders an extracted JSON value as table text.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(render_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedCompleter;
    use serde_json::json;

    fn columns() -> Vec<String> {
        ["name", "email", "skills", "experience", "score"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_extracts_and_fills_missing_fields() {
        let llm = ScriptedCompleter::new(vec![
            r#"```json
            {"Name": "Ada Lovelace", "skills": ["Rust", "SQL"], "experience": null}
            ```"#,
        ]);
        let record = extract_candidate_fields(&llm, "resume", "jd", &columns())
            .await
            .unwrap();

        assert_eq!(record["name"], "Ada Lovelace");
        assert_eq!(record["skills"], "Rust, SQL");
        assert_eq!(record["experience"], "");
        assert_eq!(record["email"], "");
        assert!(!record.contains_key("score"));
        assert_eq!(record.len(), 4);
    }

    #[tokio::test]
    async fn test_prompt_lists_fields_without_score() {
        let llm = ScriptedCompleter::new(vec!["{}"]);
        extract_candidate_fields(&llm, "RESUME BODY", "JD BODY", &columns())
            .await
            .unwrap();
        let prompt = llm.prompt(0);
        assert!(prompt.contains("name, email, skills, experience\n"));
        assert!(prompt.contains("RESUME BODY"));
        assert!(prompt.contains("JD BODY"));
    }

    #[tokio::test]
    async fn test_placeholders_in_job_description_stay_literal() {
        let llm = ScriptedCompleter::new(vec!["{}"]);
        extract_candidate_fields(&llm, "RESUME BODY", "Paste {resume_text} here", &columns())
            .await
            .unwrap();
        let prompt = llm.prompt(0);
        assert!(prompt.contains("Paste {resume_text} here"));
        assert_eq!(prompt.matches("RESUME BODY").count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_yields_empty_record() {
        let llm = ScriptedCompleter::new(vec!["I could not read this resume."]);
        let record = extract_candidate_fields(&llm, "resume", "jd", &columns())
            .await
            .unwrap();
        assert_eq!(record.len(), 4);
        assert!(record.values().all(String::is_empty));
    }

    #[tokio::test]
    async fn test_llm_failure_is_an_error() {
        let llm = ScriptedCompleter::failing();
        let result = extract_candidate_fields(&llm, "resume", "jd", &columns()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_render_value_variants() {
        assert_eq!(render_value(&json!(null)), "");
        assert_eq!(render_value(&json!(7)), "7");
        assert_eq!(render_value(&json!(["a", 1, true])), "a, 1, true");
        assert_eq!(
            render_value(&json!([{"company": "Acme"}])),
            r#"[{"company":"Acme"}]"#
        );
        assert_eq!(render_value(&json!({"years": 5})), r#"{"years":5}"#);
    }
}
