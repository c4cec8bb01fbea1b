//! Axum route handler for batch ingestion.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::ingest::candidate_csv::parse_candidate_csv;
use crate::ingest::pipeline::{BatchReport, Pipeline};
use crate::ingest::resume_fetch::pdf_to_text;
use crate::state::AppState;
use crate::tables::ident::sanitize_table_name;

#[derive(Debug, Serialize)]
pub struct NewChatResponse {
    pub result: BatchReport,
}

/// Fields collected from the `/newChat` multipart form.
#[derive(Debug, Default)]
struct NewChatForm {
    csv: Option<Bytes>,
    jd_pdf: Option<Bytes>,
    jd_text: Option<String>,
    table_name: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<NewChatForm, AppError> {
    let mut form = NewChatForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let invalid = |e: axum::extract::multipart::MultipartError| {
            AppError::Validation(format!("Invalid '{name}' field: {e}"))
        };
        match name.as_str() {
            "csv" => form.csv = Some(field.bytes().await.map_err(invalid)?),
            "pdf" => form.jd_pdf = Some(field.bytes().await.map_err(invalid)?),
            "jd_text" | "jdText" => form.jd_text = Some(field.text().await.map_err(invalid)?),
            "tableName" | "table_name" => {
                form.table_name = Some(field.text().await.map_err(invalid)?)
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /newChat
///
/// Multipart form: `csv` (candidates with a `pdf_url` column), `pdf` (job
/// description) or `jd_text`, and `tableName`. Runs the whole batch before
/// responding; per-candidate failures are reported, not raised.
pub async fn handle_new_chat(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<NewChatResponse>, AppError> {
    let form = read_form(multipart).await?;

    let raw_table = form
        .table_name
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("tableName is required".to_string()))?;
    let table = sanitize_table_name(&raw_table).map_err(|e| AppError::Validation(e.to_string()))?;

    let csv = form
        .csv
        .ok_or_else(|| AppError::Validation("csv file is required".to_string()))?;
    let candidates = parse_candidate_csv(&csv).map_err(|e| AppError::Validation(e.to_string()))?;

    let jd_text = match (form.jd_pdf, form.jd_text) {
        (Some(pdf), _) if !pdf.is_empty() => pdf_to_text(pdf).await.map_err(|e| {
            AppError::UnprocessableEntity(format!("Could not read job description PDF: {e}"))
        })?,
        (_, Some(text)) => text,
        _ => {
            return Err(AppError::Validation(
                "a job description is required (pdf or jd_text)".to_string(),
            ))
        }
    };
    if jd_text.trim().is_empty() {
        return Err(AppError::Validation(
            "job description cannot be empty".to_string(),
        ));
    }

    info!(
        "New batch for table {table}: {} candidates, JD {} chars",
        candidates.len(),
        jd_text.len()
    );

    let pipeline = Pipeline {
        llm: &state.llm,
        scorer: state.scorer.as_ref(),
        resumes: state.resumes.as_ref(),
        store: &state.db,
    };
    let result = pipeline.process_batch(&jd_text, &table, &candidates).await?;

    Ok(Json(NewChatResponse { result }))
}
