//! SQL Generator with LLM provider failover.

mod client;
mod generator;
mod models;

pub(crate) use client::LLMClient;
pub use generator::SqlGenerator;
pub use models::{GeneratedSql, LLMError, LlmProviderConfig, StructuredSqlResponse};
