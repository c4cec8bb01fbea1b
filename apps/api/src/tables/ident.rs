//! Identifier hygiene for per-job candidate tables.
//!
//! Table names arrive from the client and column names from the LLM, so both are
//! normalised to `[a-z0-9_]` before they are spliced into DDL, and always quoted.

use thiserror::Error;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENT_LEN: usize = 63;

pub const REJECTED_TABLE: &str = "rejected_candidates";
pub const SCORE_COLUMN: &str = "score";

/// Columns used when the job description yields no usable schema.
pub const DEFAULT_COLUMNS: [&str; 7] = [
    "name",
    "email",
    "phone",
    "skills",
    "experience",
    "education",
    "linkedin",
];

/// Columns every candidate table already has.
const SYSTEM_COLUMNS: [&str; 2] = ["id", "created_at"];

#[derive(Debug, Error, PartialEq)]
pub enum IdentError {
    #[error("table name '{0}' contains no usable characters")]
    Empty(String),

    #[error("table name '{0}' is reserved")]
    Reserved(String),
}

/// Lowercases, replaces anything outside `[a-z0-9_]` with `_`, collapses runs of
/// `_` and trims them from both ends.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '_'
        };
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches('_').to_string()
}

/// Prefixes identifiers that start with a digit and clips to the identifier limit.
fn finish(mut ident: String, digit_prefix: &str) -> String {
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert_str(0, digit_prefix);
    }
    // ASCII only at this point, so byte truncation is char-safe
    ident.truncate(MAX_IDENT_LEN);
    ident.trim_end_matches('_').to_string()
}

pub fn sanitize_table_name(raw: &str) -> Result<String, IdentError> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return Err(IdentError::Empty(raw.to_string()));
    }
    let name = finish(normalized, "t_");
    if name == REJECTED_TABLE {
        return Err(IdentError::Reserved(raw.to_string()));
    }
    Ok(name)
}

pub fn sanitize_column_name(raw: &str) -> Option<String> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return None;
    }
    let name = finish(normalized, "c_");
    if SYSTEM_COLUMNS.contains(&name.as_str()) {
        return Some(format!("{name}_value"));
    }
    Some(name)
}

/// Sanitizes, drops empties, de-duplicates (first wins) and guarantees `score`
/// is present as the last column.
pub fn normalize_columns<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(raw.len() + 1);
    for name in raw.iter().filter_map(|c| sanitize_column_name(c.as_ref())) {
        if name != SCORE_COLUMN && !columns.contains(&name) {
            columns.push(name);
        }
    }
    columns.push(SCORE_COLUMN.to_string());
    columns
}

pub fn default_columns() -> Vec<String> {
    normalize_columns(&DEFAULT_COLUMNS)
}

/// Quotes an identifier for inclusion in SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
