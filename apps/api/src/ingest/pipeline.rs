//! Batch ingestion: orchestrates schema inference, table creation and the
//! per-candidate fetch → extract → score → insert loop.
//!
//! A candidate's failure is logged, written to `rejected_candidates` and
//! reported; it never aborts the rest of the batch. Only table creation can.

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingest::candidate_csv::CandidateRow;
use crate::ingest::extraction::extract_candidate_fields;
use crate::ingest::resume_fetch::{FetchError, ResumeSource};
use crate::ingest::schema_inference::infer_columns;
use crate::ingest::scoring::{format_score, CandidateScorer, ScoreError};
use crate::llm_client::{LlmError, TextCompleter};
use crate::tables::ident::SCORE_COLUMN;
use crate::tables::store::CandidateStore;

#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Error downloading or processing PDF: {0}")]
    Fetch(#[from] FetchError),

    #[error("Error extracting candidate info: {0}")]
    Extract(#[from] LlmError),

    #[error("Error calculating score: {0}")]
    Score(#[from] ScoreError),

    #[error("Error storing candidate: {0:#}")]
    Store(anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateFailure {
    /// 1-based position in the uploaded CSV.
    pub index: usize,
    pub candidate: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub table: String,
    pub columns: Vec<String>,
    pub processed: usize,
    pub failed: usize,
    pub failures: Vec<CandidateFailure>,
    pub message: String,
}

/// Everything a batch run talks to, borrowed from `AppState` (or fakes in tests).
pub struct Pipeline<'a> {
    pub llm: &'a dyn TextCompleter,
    pub scorer: &'a dyn CandidateScorer,
    pub resumes: &'a dyn ResumeSource,
    pub store: &'a dyn CandidateStore,
}

impl Pipeline<'_> {
    /// Runs a full batch against a freshly (re)created `table`.
    pub async fn process_batch(
        &self,
        jd_text: &str,
        table: &str,
        candidates: &[CandidateRow],
    ) -> Result<BatchReport, AppError> {
        let batch_id = Uuid::new_v4();

        info!("[{batch_id}] Step 1: analyzing job description to determine columns");
        let columns = infer_columns(self.llm, jd_text).await;

        info!("[{batch_id}] Step 2: creating table {table}");
        self.store
            .recreate_table(table, &columns)
            .await
            .map_err(AppError::Internal)?;

        info!(
            "[{batch_id}] Step 3: processing {} candidates",
            candidates.len()
        );
        let total = candidates.len();
        let mut processed = 0;
        let mut failures = Vec::new();

        for (i, candidate) in candidates.iter().enumerate() {
            let index = i + 1;
            info!("[{batch_id}] Processing candidate {index}/{total}");

            match self
                .process_candidate(jd_text, table, &columns, candidate)
                .await
            {
                Ok(score) => {
                    processed += 1;
                    info!("[{batch_id}] Candidate {index} stored with score {score}");
                }
                Err(e) => {
                    warn!("[{batch_id}] Error processing candidate {index}: {e}");
                    let reason = e.to_string();
                    if let Err(log_err) = self
                        .store
                        .record_rejection(candidate.label(), &reason)
                        .await
                    {
                        warn!(
                            "[{batch_id}] Could not record rejection for candidate {index}: {log_err}"
                        );
                    }
                    failures.push(CandidateFailure {
                        index,
                        candidate: candidate.label().to_string(),
                        reason,
                    });
                }
            }
        }

        info!("[{batch_id}] Processing completed. {processed} candidates processed successfully.");

        Ok(BatchReport {
            batch_id,
            table: table.to_string(),
            columns,
            processed,
            failed: failures.len(),
            failures,
            message: format!(
                "Processing completed successfully. {processed} candidates processed."
            ),
        })
    }

    async fn process_candidate(
        &self,
        jd_text: &str,
        table: &str,
        columns: &[String],
        candidate: &CandidateRow,
    ) -> Result<f64, CandidateError> {
        let resume_text = self.resumes.resume_text(&candidate.pdf_url).await?;
        info!(
            "Resume text extracted, length: {} characters",
            resume_text.chars().count()
        );

        let mut record = extract_candidate_fields(self.llm, &resume_text, jd_text, columns).await?;

        let score = self.scorer.score(&record, jd_text).await?;
        record.insert(SCORE_COLUMN.to_string(), format_score(score));

        self.store
            .insert_candidate(table, columns, &record)
            .await
            .map_err(CandidateError::Store)?;

        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::ingest::extraction::CandidateRecord;
    use crate::llm_client::testing::ScriptedCompleter;

    /// Serves resume text keyed by URL; unknown URLs fail like a 404.
    struct FakeResumes(HashMap<String, String>);

    #[async_trait]
    impl ResumeSource for FakeResumes {
        async fn resume_text(&self, url: &str) -> Result<String, FetchError> {
            self.0.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    /// Scores by the length of the candidate's name; "" fails.
    struct NameLengthScorer;

    #[async_trait]
    impl CandidateScorer for NameLengthScorer {
        async fn score(&self, candidate: &CandidateRecord, _jd: &str) -> Result<f64, ScoreError> {
            match candidate.get("name").map(String::len) {
                Some(n) if n > 0 => Ok(n as f64 * 10.0),
                _ => Err(ScoreError::NotANumber("no name".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        tables: Mutex<HashMap<String, Vec<String>>>,
        rows: Mutex<Vec<HashMap<String, String>>>,
        rejections: Mutex<Vec<(String, String)>>,
        fail_create: bool,
    }

    #[async_trait]
    impl CandidateStore for MemoryStore {
        async fn recreate_table(&self, table: &str, columns: &[String]) -> anyhow::Result<()> {
            if self.fail_create {
                anyhow::bail!("permission denied for schema public");
            }
            self.tables
                .lock()
                .unwrap()
                .insert(table.to_string(), columns.to_vec());
            self.rows.lock().unwrap().clear();
            Ok(())
        }

        async fn insert_candidate(
            &self,
            _table: &str,
            columns: &[String],
            record: &HashMap<String, String>,
        ) -> anyhow::Result<()> {
            let row = columns
                .iter()
                .map(|c| (c.clone(), record.get(c).cloned().unwrap_or_default()))
                .collect();
            self.rows.lock().unwrap().push(row);
            Ok(())
        }

        async fn record_rejection(&self, name: &str, reason: &str) -> anyhow::Result<()> {
            self.rejections
                .lock()
                .unwrap()
                .push((name.to_string(), reason.to_string()));
            Ok(())
        }
    }

    fn row(url: &str, name: Option<&str>) -> CandidateRow {
        CandidateRow {
            pdf_url: url.to_string(),
            name: name.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_failed_candidates_do_not_abort_batch() {
        // columns, then one extraction per candidate that reaches the LLM
        let llm = ScriptedCompleter::new(vec![
            r#"["name", "skills"]"#,
            r#"{"name": "Ada", "skills": ["Rust"]}"#,
            r#"{"name": "", "skills": "Go"}"#,
            r#"{"name": "Linus", "skills": "C"}"#,
        ]);
        let resumes = FakeResumes(
            [
                ("https://cv.test/ada.pdf", "Ada resume"),
                ("https://cv.test/anon.pdf", "Anon resume"),
                ("https://cv.test/linus.pdf", "Linus resume"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        );
        let store = MemoryStore::default();
        let pipeline = Pipeline {
            llm: &llm,
            scorer: &NameLengthScorer,
            resumes: &resumes,
            store: &store,
        };
        let candidates = vec![
            row("https://cv.test/ada.pdf", Some("Ada")),
            row("https://cv.test/missing.pdf", Some("Ghost")),
            row("https://cv.test/anon.pdf", None),
            row("https://cv.test/linus.pdf", None),
        ];

        let report = pipeline
            .process_batch("Systems engineer", "systems_hires", &candidates)
            .await
            .unwrap();

        assert_eq!(report.columns, vec!["name", "skills", "score"]);
        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[0].candidate, "Ghost");
        assert!(report.failures[0].reason.contains("404"));
        assert_eq!(report.failures[1].candidate, "https://cv.test/anon.pdf");
        assert_eq!(
            report.message,
            "Processing completed successfully. 2 candidates processed."
        );

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Ada");
        assert_eq!(rows[0]["skills"], "Rust");
        assert_eq!(rows[0]["score"], "30.0");
        assert_eq!(rows[1]["name"], "Linus");

        let rejections = store.rejections.lock().unwrap();
        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].0, "Ghost");
    }

    #[tokio::test]
    async fn test_table_creation_failure_aborts() {
        let llm = ScriptedCompleter::new(vec![r#"["name"]"#]);
        let store = MemoryStore {
            fail_create: true,
            ..Default::default()
        };
        let pipeline = Pipeline {
            llm: &llm,
            scorer: &NameLengthScorer,
            resumes: &FakeResumes(HashMap::new()),
            store: &store,
        };

        let result = pipeline
            .process_batch("jd", "t", &[row("https://cv.test/a.pdf", None)])
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(store.rejections.lock().unwrap().is_empty());
        // Only the column inference call was made
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_unusable_schema_uses_default_columns() {
        let llm = ScriptedCompleter::new(vec!["no idea"]);
        let store = MemoryStore::default();
        let pipeline = Pipeline {
            llm: &llm,
            scorer: &NameLengthScorer,
            resumes: &FakeResumes(HashMap::new()),
            store: &store,
        };

        let report = pipeline.process_batch("jd", "t", &[]).await.unwrap();

        assert_eq!(report.columns.len(), 8);
        assert_eq!(report.processed, 0);
        assert!(store.tables.lock().unwrap().contains_key("t"));
    }
}
