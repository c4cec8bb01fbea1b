// Batch ingestion: JD schema inference, resume fetch, field extraction, scoring.
// All LLM calls go through llm_client.

pub mod candidate_csv;
pub mod extraction;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod resume_fetch;
pub mod schema_inference;
pub mod scoring;
