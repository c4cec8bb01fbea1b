use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::agent::{SqlAgent, TableContext};
use crate::errors::AppError;
use crate::state::AppState;
use crate::tables::ident::sanitize_table_name;
use crate::tables::store;

/// Sample rows shown to the agent alongside the column list.
const SAMPLE_ROWS: i64 = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub table_name: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub result: String,
    pub queries: Vec<String>,
}

/// POST /chat
///
/// Answers a natural-language question using only the named candidate table.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }
    let table =
        sanitize_table_name(&request.table_name).map_err(|e| AppError::Validation(e.to_string()))?;

    if !store::table_exists(&state.db, &table).await? {
        return Err(AppError::NotFound(format!("Table {table} not found")));
    }

    let ctx = TableContext {
        columns: store::table_columns(&state.db, &table).await?,
        samples: store::table_rows(&state.db, &table, Some(SAMPLE_ROWS))
            .await?
            .into_iter()
            .map(Value::Object)
            .collect(),
        table,
    };

    let agent = SqlAgent {
        llm: &state.llm,
        runner: &state.db,
        max_steps: state.config.sql_agent_max_steps,
    };
    let answer = agent
        .ask(&ctx, &request.query)
        .await
        .map_err(|e| AppError::Llm(format!("Error processing query: {e}")))?;

    Ok(Json(ChatResponse {
        result: answer.answer,
        queries: answer.queries,
    }))
}
