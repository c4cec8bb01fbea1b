use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::rejected::RejectedCandidateRow;
use crate::state::AppState;
use crate::tables::ident::sanitize_table_name;
use crate::tables::store::{self, TableInsights};

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

/// GET /gettables
pub async fn handle_get_tables(
    State(state): State<AppState>,
) -> Result<Json<TablesResponse>, AppError> {
    let tables = store::list_tables(&state.db).await?;
    Ok(Json(TablesResponse { tables }))
}

/// GET /tables/:table_name
///
/// Returns the table's columns and every stored row, values as strings.
pub async fn handle_table_insights(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> Result<Json<TableInsights>, AppError> {
    let table = sanitize_table_name(&table_name).map_err(|e| AppError::Validation(e.to_string()))?;

    let insights = store::table_insights(&state.db, &table)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Table {table} not found")))?;

    Ok(Json(insights))
}

/// GET /rejected
pub async fn handle_get_rejected(
    State(state): State<AppState>,
) -> Result<Json<Vec<RejectedCandidateRow>>, AppError> {
    let rows = store::list_rejections(&state.db).await?;
    Ok(Json(rows))
}
