use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A candidate that could not be processed, with the reason it failed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RejectedCandidateRow {
    pub id: i32,
    pub name: Option<String>,
    pub reason: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}
