//! CRUD against the per-job candidate tables and the rejection log.
//!
//! Every table and column name reaching this module has already been through
//! `tables::ident`; they are still quoted on the way into SQL.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::chat::sql_guard::strip_trailing_semicolon;
use crate::models::rejected::RejectedCandidateRow;
use crate::tables::ident::{quote_ident, REJECTED_TABLE};

/// Max rows a read-only agent query may return.
pub const AGENT_ROW_LIMIT: i64 = 50;
const AGENT_STATEMENT_TIMEOUT: &str = "10s";
const REJECTION_NAME_MAX_CHARS: usize = 255;

#[derive(Debug, Serialize)]
pub struct TableInsights {
    pub columns: Vec<String>,
    pub data: Vec<Map<String, Value>>,
}

/// Builds `CREATE TABLE` DDL for a candidate table: all extracted fields are TEXT.
pub fn create_table_sql(table: &str, columns: &[String]) -> String {
    let column_defs = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE {} (id SERIAL PRIMARY KEY, {}, created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
        quote_ident(table),
        column_defs
    )
}

/// Builds the parameterised INSERT for one candidate row.
pub fn insert_sql(table: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_ident(table)
    )
}

/// Drops any previous table of the same name and creates it fresh.
pub async fn recreate_table(pool: &PgPool, table: &str, columns: &[String]) -> Result<()> {
    let drop_sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
    let create_sql = create_table_sql(table, columns);
    debug!("CREATE TABLE SQL: {create_sql}");

    let mut tx = pool.begin().await?;
    sqlx::query(&drop_sql).execute(&mut *tx).await?;
    sqlx::query(&create_sql).execute(&mut *tx).await?;
    tx.commit().await?;

    info!("Table {table} created with columns: {columns:?}");
    Ok(())
}

/// Inserts one candidate. Columns missing from `record` are stored as "".
pub async fn insert_candidate(
    pool: &PgPool,
    table: &str,
    columns: &[String],
    record: &HashMap<String, String>,
) -> Result<()> {
    let sql = insert_sql(table, columns);
    let mut query = sqlx::query(&sql);
    for column in columns {
        query = query.bind(record.get(column).cloned().unwrap_or_default());
    }
    query.execute(pool).await?;
    Ok(())
}

/// Names of all candidate tables in the public schema.
pub async fn list_tables(pool: &PgPool) -> Result<Vec<String>> {
    let tables: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = 'public' AND table_name <> $1
        ORDER BY table_name
        "#,
    )
    .bind(REJECTED_TABLE)
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

pub async fn table_exists(pool: &PgPool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Column names in declaration order.
pub async fn table_columns(pool: &PgPool, table: &str) -> Result<Vec<String>> {
    let columns: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = 'public' AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(columns)
}

/// Up to `limit` rows of `table` as JSON objects, values rendered as strings.
pub async fn table_rows(
    pool: &PgPool,
    table: &str,
    limit: Option<i64>,
) -> Result<Vec<Map<String, Value>>> {
    let mut sql = format!("SELECT to_jsonb(t) FROM {} t", quote_ident(table));
    if limit.is_some() {
        sql.push_str(" LIMIT $1");
    }
    let mut query = sqlx::query_scalar::<_, Value>(&sql);
    if let Some(limit) = limit {
        query = query.bind(limit);
    }
    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(stringify_row).collect())
}

/// Columns plus every row of the table. Returns `None` for an unknown table.
pub async fn table_insights(pool: &PgPool, table: &str) -> Result<Option<TableInsights>> {
    let columns = table_columns(pool, table).await?;
    if columns.is_empty() {
        return Ok(None);
    }
    let data = table_rows(pool, table, None).await?;
    Ok(Some(TableInsights { columns, data }))
}

/// Wraps a validated agent query so it yields one JSON object per row, capped
/// at `AGENT_ROW_LIMIT`. The statement sits on its own lines so a trailing
/// `--` comment cannot swallow the closing parenthesis.
pub fn wrap_agent_sql(sql: &str) -> String {
    format!(
        "SELECT row_to_json(q) FROM (\n{}\n) q LIMIT {AGENT_ROW_LIMIT}",
        strip_trailing_semicolon(sql).trim()
    )
}

/// Runs an agent-authored SELECT in a read-only transaction and returns its rows.
/// The caller has already validated `sql` as a single read statement.
pub async fn run_read_only_query(pool: &PgPool, sql: &str) -> Result<Vec<Value>, sqlx::Error> {
    let wrapped = wrap_agent_sql(sql);

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION READ ONLY")
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "SET LOCAL statement_timeout = '{AGENT_STATEMENT_TIMEOUT}'"
    ))
    .execute(&mut *tx)
    .await?;
    let rows: Vec<Value> = sqlx::query_scalar(&wrapped).fetch_all(&mut *tx).await?;
    tx.rollback().await?;
    Ok(rows)
}

pub async fn record_rejection(pool: &PgPool, name: &str, reason: &str) -> Result<()> {
    let name: String = name.chars().take(REJECTION_NAME_MAX_CHARS).collect();
    sqlx::query("INSERT INTO rejected_candidates (name, reason) VALUES ($1, $2)")
        .bind(name)
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_rejections(pool: &PgPool) -> Result<Vec<RejectedCandidateRow>> {
    let rows = sqlx::query_as::<_, RejectedCandidateRow>(
        "SELECT id, name, reason, created_at FROM rejected_candidates ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Write side used by the ingestion pipeline.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    async fn recreate_table(&self, table: &str, columns: &[String]) -> Result<()>;

    async fn insert_candidate(
        &self,
        table: &str,
        columns: &[String],
        record: &HashMap<String, String>,
    ) -> Result<()>;

    async fn record_rejection(&self, name: &str, reason: &str) -> Result<()>;
}

#[async_trait]
impl CandidateStore for PgPool {
    async fn recreate_table(&self, table: &str, columns: &[String]) -> Result<()> {
        recreate_table(self, table, columns).await
    }

    async fn insert_candidate(
        &self,
        table: &str,
        columns: &[String],
        record: &HashMap<String, String>,
    ) -> Result<()> {
        insert_candidate(self, table, columns, record).await
    }

    async fn record_rejection(&self, name: &str, reason: &str) -> Result<()> {
        record_rejection(self, name, reason).await
    }
}

/// Renders every value as a string (or null) so clients see uniform cells.
fn stringify_row(row: Value) -> Map<String, Value> {
    match row {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::Null => Value::Null,
                    Value::String(s) => Value::String(s),
                    other => Value::String(other.to_string()),
                };
                (k, v)
            })
            .collect(),
        _ => Map::new(),
    }
}
