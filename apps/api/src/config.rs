use std::num::NonZeroUsize;

use anyhow::{Context, Result};

pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LLM_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub google_api_key: String,
    pub llm_model: String,
    pub llm_endpoint: String,
    pub sql_agent_max_steps: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        // CONNECTION_URL is the name older deployments used
        let database_url = require_env("DATABASE_URL")
            .or_else(|_| require_env("CONNECTION_URL"))
            .context("Set DATABASE_URL (or CONNECTION_URL) to a PostgreSQL connection string")?;

        Ok(Config {
            database_url,
            google_api_key: require_env("GOOGLE_API_KEY")?,
            llm_model: optional_env("LLM_MODEL", DEFAULT_LLM_MODEL),
            llm_endpoint: optional_env("LLM_ENDPOINT", DEFAULT_LLM_ENDPOINT),
            sql_agent_max_steps: parse_max_steps(&optional_env("SQL_AGENT_MAX_STEPS", "6"))?,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The agent needs at least one step to run a query.
fn parse_max_steps(raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<NonZeroUsize>()
        .map(NonZeroUsize::get)
        .with_context(|| format!("SQL_AGENT_MAX_STEPS must be a positive integer, got '{raw}'"))
}
