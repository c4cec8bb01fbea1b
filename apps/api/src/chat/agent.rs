//! SQL agent: answers natural-language questions about one candidate table.
//!
//! A bounded query/observe loop: each step the LLM either proposes a SELECT
//! (checked by `sql_guard`, run read-only) or gives the final answer. When the
//! step budget runs out, one last call answers from what was observed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::chat::prompts::{AGENT_FINAL_PROMPT, AGENT_STEP_PROMPT};
use crate::chat::sql_guard::validate_sql;
use crate::llm_client::prompts::fill_prompt;
use crate::llm_client::{strip_json_fences, LlmError, TextCompleter};
use crate::tables::store::{run_read_only_query, AGENT_ROW_LIMIT};

/// Observations longer than this are cut before going back into the prompt.
const MAX_OBSERVATION_CHARS: usize = 4000;

/// What the agent knows about its table up front.
#[derive(Debug, Clone)]
pub struct TableContext {
    pub table: String,
    pub columns: Vec<String>,
    pub samples: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum AgentStep {
    Query { sql: String },
    Answer { answer: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentAnswer {
    pub answer: String,
    /// Queries that were actually executed, in order.
    pub queries: Vec<String>,
}

/// Executes validated read-only SQL.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run(&self, sql: &str) -> Result<Vec<Value>, String>;
}

#[async_trait]
impl QueryRunner for PgPool {
    async fn run(&self, sql: &str) -> Result<Vec<Value>, String> {
        run_read_only_query(self, sql).await.map_err(|e| e.to_string())
    }
}

pub struct SqlAgent<'a> {
    pub llm: &'a dyn TextCompleter,
    pub runner: &'a dyn QueryRunner,
    pub max_steps: usize,
}

impl SqlAgent<'_> {
    pub async fn ask(&self, ctx: &TableContext, question: &str) -> Result<AgentAnswer, LlmError> {
        let mut transcript: Vec<String> = Vec::new();
        let mut queries: Vec<String> = Vec::new();

        for step in 1..=self.max_steps {
            let prompt = build_step_prompt(ctx, question, &transcript);
            let reply = self.llm.complete(&prompt).await?;
            debug!("Agent step {step} reply: {reply}");

            let action = match serde_json::from_str::<AgentStep>(strip_json_fences(&reply)) {
                Ok(action) => action,
                Err(_) => {
                    // A model that skips the protocol is answering in prose
                    info!("Agent answered in free text at step {step}");
                    return Ok(AgentAnswer {
                        answer: reply.trim().to_string(),
                        queries,
                    });
                }
            };

            match action {
                AgentStep::Answer { answer } => {
                    info!("Agent answered after {step} step(s), {} queries", queries.len());
                    return Ok(AgentAnswer { answer, queries });
                }
                AgentStep::Query { sql } => {
                    let observation = self.observe(&sql, &ctx.table, &mut queries).await;
                    transcript.push(format!(
                        "Step {step}\nSQL: {sql}\nObservation: {observation}"
                    ));
                }
            }
        }

        warn!(
            "Agent hit the {} step limit on table {}; answering from observations",
            self.max_steps, ctx.table
        );
        let transcript = render_transcript(&transcript);
        let prompt = fill_prompt(
            AGENT_FINAL_PROMPT,
            &[
                ("table", ctx.table.as_str()),
                ("transcript", transcript.as_str()),
                ("question", question),
            ],
        );
        let answer = self.llm.complete(&prompt).await?;

        Ok(AgentAnswer {
            answer: strip_json_fences(&answer).to_string(),
            queries,
        })
    }

    /// Validates and runs one query, returning the observation text.
    async fn observe(&self, sql: &str, table: &str, queries: &mut Vec<String>) -> String {
        if let Err(reason) = validate_sql(sql, table) {
            warn!("Agent query rejected ({reason}): {sql}");
            return format!("Query rejected: {reason}");
        }

        queries.push(sql.to_string());
        match self.runner.run(sql).await {
            Ok(rows) => {
                info!("Agent query returned {} rows", rows.len());
                truncate(&format!(
                    "{} row(s): {}",
                    rows.len(),
                    Value::Array(rows)
                ))
            }
            Err(e) => {
                warn!("Agent query failed: {e}");
                format!("Query failed: {e}")
            }
        }
    }
}

fn build_step_prompt(ctx: &TableContext, question: &str, transcript: &[String]) -> String {
    let samples = if ctx.samples.is_empty() {
        "(table is empty)".to_string()
    } else {
        ctx.samples
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let max_rows = AGENT_ROW_LIMIT.to_string();
    let columns = ctx.columns.join(", ");
    let samples = truncate(&samples);
    let transcript = render_transcript(transcript);

    fill_prompt(
        AGENT_STEP_PROMPT,
        &[
            ("max_rows", max_rows.as_str()),
            ("table", ctx.table.as_str()),
            ("columns", columns.as_str()),
            ("samples", samples.as_str()),
            ("transcript", transcript.as_str()),
            ("question", question),
        ],
    )
}

fn render_transcript(transcript: &[String]) -> String {
    if transcript.is_empty() {
        "(none)".to_string()
    } else {
        transcript.join("\n\n")
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_OBSERVATION_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_OBSERVATION_CHARS).collect();
    format!("{cut}... (truncated)")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::llm_client::testing::ScriptedCompleter;
    use serde_json::json;

    /// Returns canned rows and records what it was asked to run.
    #[derive(Default)]
    struct FakeRunner {
        rows: Vec<Value>,
        fail_with: Option<String>,
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryRunner for FakeRunner {
        async fn run(&self, sql: &str) -> Result<Vec<Value>, String> {
            self.ran.lock().unwrap().push(sql.to_string());
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(self.rows.clone()),
            }
        }
    }

    fn ctx() -> TableContext {
        TableContext {
            table: "rust_hires".to_string(),
            columns: vec!["id".into(), "name".into(), "score".into(), "created_at".into()],
            samples: vec![json!({"id": 1, "name": "Ada", "score": "91.0"})],
        }
    }

    #[tokio::test]
    async fn test_query_then_answer() {
        let llm = ScriptedCompleter::new(vec![
            r#"{"action": "query", "sql": "SELECT name FROM rust_hires ORDER BY CAST(score AS FLOAT) DESC LIMIT 1"}"#,
            r#"```json
            {"action": "answer", "answer": "Ada is the strongest candidate."}
            ```"#,
        ]);
        let runner = FakeRunner {
            rows: vec![json!({"name": "Ada"})],
            ..Default::default()
        };
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 4 };

        let answer = agent.ask(&ctx(), "Who is the best candidate?").await.unwrap();

        assert_eq!(answer.answer, "Ada is the strongest candidate.");
        assert_eq!(answer.queries.len(), 1);
        assert_eq!(runner.ran.lock().unwrap().len(), 1);
        let second_prompt = llm.prompt(1);
        assert!(second_prompt.contains(r#"1 row(s): [{"name":"Ada"}]"#));
        assert!(second_prompt.contains("Who is the best candidate?"));
    }

    #[tokio::test]
    async fn test_rejected_query_is_not_executed() {
        let llm = ScriptedCompleter::new(vec![
            r#"{"action": "query", "sql": "SELECT * FROM rejected_candidates"}"#,
            r#"{"action": "answer", "answer": "I can only use rust_hires."}"#,
        ]);
        let runner = FakeRunner::default();
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 4 };

        let answer = agent.ask(&ctx(), "Who was rejected?").await.unwrap();

        assert!(runner.ran.lock().unwrap().is_empty());
        assert!(answer.queries.is_empty());
        assert!(llm.prompt(1).contains("Query rejected: only the table 'rust_hires'"));
    }

    #[tokio::test]
    async fn test_database_error_becomes_observation() {
        let llm = ScriptedCompleter::new(vec![
            r#"{"action": "query", "sql": "SELECT nme FROM rust_hires"}"#,
            r#"{"action": "answer", "answer": "done"}"#,
        ]);
        let runner = FakeRunner {
            fail_with: Some("column \"nme\" does not exist".to_string()),
            ..Default::default()
        };
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 4 };

        agent.ask(&ctx(), "names?").await.unwrap();

        assert!(llm.prompt(1).contains("Query failed: column \"nme\" does not exist"));
    }

    #[tokio::test]
    async fn test_stored_cell_text_is_not_expanded() {
        let llm = ScriptedCompleter::new(vec![r#"{"action": "answer", "answer": "ok"}"#]);
        let runner = FakeRunner::default();
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 2 };
        let mut context = ctx();
        context.samples = vec![json!({"name": "{question}"})];

        agent.ask(&context, "Who knows Rust?").await.unwrap();

        let prompt = llm.prompt(0);
        assert!(prompt.contains(r#"{"name":"{question}"}"#));
        assert_eq!(prompt.matches("Who knows Rust?").count(), 1);
    }

    #[tokio::test]
    async fn test_free_text_reply_is_the_answer() {
        let llm = ScriptedCompleter::new(vec!["There are 12 candidates."]);
        let runner = FakeRunner::default();
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 4 };

        let answer = agent.ask(&ctx(), "How many?").await.unwrap();

        assert_eq!(answer.answer, "There are 12 candidates.");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_step_limit_forces_final_answer() {
        let query = r#"{"action": "query", "sql": "SELECT COUNT(*) FROM rust_hires"}"#;
        let llm = ScriptedCompleter::new(vec![query, query, "Probably 3 candidates."]);
        let runner = FakeRunner {
            rows: vec![json!({"count": 3})],
            ..Default::default()
        };
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 2 };

        let answer = agent.ask(&ctx(), "How many?").await.unwrap();

        assert_eq!(answer.answer, "Probably 3 candidates.");
        assert_eq!(answer.queries.len(), 2);
        assert_eq!(llm.calls(), 3);
        assert!(llm.prompt(2).contains("run out of query attempts"));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let llm = ScriptedCompleter::failing();
        let runner = FakeRunner::default();
        let agent = SqlAgent { llm: &llm, runner: &runner, max_steps: 2 };
        assert!(agent.ask(&ctx(), "?").await.is_err());
    }

    #[test]
    fn test_agent_step_parses_both_actions() {
        let q: AgentStep = serde_json::from_str(r#"{"action":"query","sql":"SELECT 1"}"#).unwrap();
        assert_eq!(q, AgentStep::Query { sql: "SELECT 1".to_string() });
        let a: AgentStep = serde_json::from_str(r#"{"action":"answer","answer":"hi"}"#).unwrap();
        assert_eq!(a, AgentStep::Answer { answer: "hi".to_string() });
    }

    #[test]
    fn test_truncate_long_observation() {
        let long = "x".repeat(MAX_OBSERVATION_CHARS + 10);
        let cut = truncate(&long);
        assert!(cut.ends_with("... (truncated)"));
        assert_eq!(truncate("short"), "short");
    }
}
