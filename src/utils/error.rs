//! API error type shared across the pipeline.
//!
//! Mirrors the eight caller-observable error kinds the engine can produce:
//! invalid input, tenant scoping misses, classifier rejection, generation
//! failure, unsafe SQL, execution failure, cancellation, and an opaque
//! internal bucket for anything else.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("intent confidence too low")]
    IntentLowConfidence { suggestions: Vec<String> },

    #[error("SQL generation failed: {0}")]
    SQLGenerationFailed(String),

    #[error("unsafe SQL rejected: {0}")]
    UnsafeSQL(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::DataSourceNotFound(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::SQLGenerationFailed(msg.into())
    }

    pub fn unsafe_sql(msg: impl Into<String>) -> Self {
        Self::UnsafeSQL(msg.into())
    }

    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable tag for streaming `error` events and batch
    /// responses, independent of the human-readable `Display` message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::DataSourceNotFound(_) => "data_source_not_found",
            Self::IntentLowConfidence { .. } => "intent_low_confidence",
            Self::SQLGenerationFailed(_) => "sql_generation_failed",
            Self::UnsafeSQL(_) => "unsafe_sql",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::DataSourceNotFound(_) => StatusCode::NOT_FOUND,
            Self::IntentLowConfidence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SQLGenerationFailed(_) => StatusCode::BAD_GATEWAY,
            Self::UnsafeSQL(_) => StatusCode::FORBIDDEN,
            Self::ExecutionFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("database error: {}", e);
        ApiError::Internal(e.to_string())
    }
}

impl From<crate::services::llm::LLMError> for ApiError {
    fn from(e: crate::services::llm::LLMError) -> Self {
        ApiError::SQLGenerationFailed(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let suggestions = match &self {
            Self::IntentLowConfidence { suggestions } => Some(suggestions.clone()),
            _ => None,
        };

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });

        if let Some(suggestions) = suggestions {
            body["suggestions"] = json!(suggestions);
        }

        (status, Json(body)).into_response()
    }
}
