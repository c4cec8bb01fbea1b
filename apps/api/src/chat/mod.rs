// Natural-language querying over a single candidate table via an LLM SQL agent.

pub mod agent;
pub mod handlers;
pub mod prompts;
pub mod sql_guard;
