//! LLM provider configuration and the structured contract the SQL
//! Generator requires back from the model.

use serde::{Deserialize, Serialize};

/// One configured LLM endpoint. Providers are process-wide state, built
/// once at start-up from `config.llm.providers` and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub credential: String,
    pub primary_model: String,
    pub fallback_model: String,
}

/// Structured output the model is instructed to return. A response that
/// fails to parse into this shape is a `BadResponse` and counts as a
/// failed attempt, never surfaced as free-form text downstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StructuredSqlResponse {
    pub sql: String,
    pub explanation: String,
    #[serde(default)]
    pub confidence: f32,
    pub estimated_rows: Option<u64>,
    #[serde(default)]
    pub execution_plan: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// `Generate`'s success value, with the provider/model that produced it
/// attached for telemetry and the `provider_used` field in responses.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSql {
    pub sql: String,
    pub explanation: String,
    pub confidence: f32,
    pub warnings: Vec<String>,
    pub estimated_rows: Option<u64>,
    pub execution_plan: Option<String>,
    pub provider_used: String,
    pub model_used: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("no LLM provider configured")]
    NoProviderConfigured,

    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("LLM response parsing error: {0}")]
    ParseError(String),

    #[error("LLM timeout after {0}s")]
    Timeout(u64),

    #[error("LLM rate limited, retry after {0}s")]
    RateLimited(u64),

    #[error("all configured providers failed")]
    AllProvidersFailed,

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl LLMError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimited(_) | Self::ApiError(_))
    }

    /// A rate-limit/quota signal abandons the whole provider rather than
    /// retrying within it.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}
