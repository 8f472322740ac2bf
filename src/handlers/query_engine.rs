//! The three public operations: `ExecuteQuery`, `ExplainQuery`,
//! `SubmitFeedback`. Everything else — routing beyond these paths,
//! authentication, rate limiting — is handled outside this core.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::AppState;
use crate::handlers::context::RequestContext;
use crate::models::{Feedback, Intent, OptimizationAnalysis};
use crate::services::{ExecuteQueryRequest, ExecuteQueryResponse};
use crate::utils::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExplainQueryRequest {
    pub natural_language: String,
    pub data_source_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SqlExplain {
    pub query: String,
    pub explanation: String,
    pub optimizations: Vec<String>,
    pub estimated_complexity: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExplainQueryResponse {
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlExplain>,
    pub recommendations: Vec<String>,
}

/// `ExecuteQuery`. Non-streaming requests get the buffered
/// `ExecuteQueryResponse`; `streaming: true` gets a chunked
/// newline-delimited-JSON body of `PipelineEvent`s that stays half-open
/// until the terminal event, per the wire protocol.
#[utoipa::path(
    post,
    path = "/api/query/execute",
    request_body = ExecuteQueryRequest,
    responses(
        (status = 200, description = "Query executed (or terminal stream event emitted)"),
        (status = 422, description = "Intent confidence too low"),
        (status = 403, description = "Generated SQL rejected as unsafe"),
    ),
    tag = "Query Engine"
)]
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<ExecuteQueryRequest>,
) -> Response {
    let data_source = match state.data_sources.get(&ctx.tenant, &req.data_source_id).await {
        Ok(ds) => ds,
        Err(e) => return e.into_response(),
    };

    if req.streaming {
        let (sender, stream) = crate::services::streaming::channel(state.config.executor.progress_buffer);
        let cancellation = CancellationToken::new();
        let orchestrator = Arc::clone(&state.orchestrator);
        let tenant = ctx.tenant.clone();
        let user = ctx.user.clone();
        let task_cancellation = cancellation.clone();

        tokio::spawn(async move {
            let _ = orchestrator
                .execute(tenant, user, data_source, req, Some(sender), task_cancellation)
                .await;
        });

        let body_stream = stream.map(|event| Ok::<_, std::convert::Infallible>(event.to_ndjson_line()));
        return Response::builder()
            .header("content-type", "application/x-ndjson")
            .body(Body::from_stream(body_stream))
            .unwrap()
            .into_response();
    }

    // Batch callers receive only the terminal event: no sender is
    // attached, so the orchestrator never emits intermediate `Progress`.
    let result = state
        .orchestrator
        .execute(ctx.tenant, ctx.user, data_source, req, None, CancellationToken::new())
        .await;

    match result {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `ExplainQuery`: runs classification and generation only, never
/// reaches the executor.
#[utoipa::path(
    post,
    path = "/api/query/explain",
    request_body = ExplainQueryRequest,
    responses((status = 200, description = "Intent and candidate SQL", body = ExplainQueryResponse)),
    tag = "Query Engine"
)]
pub async fn explain_query(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<ExplainQueryRequest>,
) -> ApiResult<Json<ExplainQueryResponse>> {
    if req.natural_language.len() < 5 || req.natural_language.len() > 1000 {
        return Err(ApiError::validation_error("natural_language must be 5-1000 characters"));
    }

    let data_source = state.data_sources.get(&ctx.tenant, &req.data_source_id).await?;
    let (intent, generated) = state.orchestrator.explain(&data_source, &req.natural_language).await?;

    let generated = match generated {
        Ok(g) => g,
        Err(ApiError::IntentLowConfidence { suggestions }) => {
            return Ok(Json(ExplainQueryResponse { intent, sql: None, recommendations: suggestions }));
        },
        Err(e) => {
            return Ok(Json(ExplainQueryResponse {
                intent,
                sql: None,
                recommendations: vec![format!("SQL generation failed: {}", e)],
            }));
        },
    };

    let formatted = crate::services::sql_validator::validate_and_format(
        &generated.sql,
        data_source.kind.dialect(),
    );

    let (query, analysis) = match formatted {
        Ok(sql) => {
            let analysis = crate::services::query_manager::score_sql(&sql);
            (sql, analysis)
        },
        Err(e) => {
            return Ok(Json(ExplainQueryResponse {
                intent,
                sql: None,
                recommendations: vec![format!("generated SQL rejected: {}", e)],
            }));
        },
    };

    let recommendations = generated.warnings.iter().cloned().chain(analysis.suggestions.clone()).collect();

    Ok(Json(ExplainQueryResponse {
        intent,
        sql: Some(SqlExplain {
            query,
            explanation: generated.explanation,
            optimizations: analysis.suggestions,
            estimated_complexity: complexity_label(&analysis),
        }),
        recommendations,
    }))
}

fn complexity_label(analysis: &OptimizationAnalysis) -> String {
    match analysis.category {
        crate::models::OptimizationCategory::Excellent => "low".to_string(),
        crate::models::OptimizationCategory::Good => "moderate".to_string(),
        crate::models::OptimizationCategory::Fair => "elevated".to_string(),
        crate::models::OptimizationCategory::Poor => "high".to_string(),
    }
}

/// `SubmitFeedback`.
#[utoipa::path(
    post,
    path = "/api/query/{id}/feedback",
    params(("id" = String, Path, description = "QueryRecord id")),
    request_body = Feedback,
    responses((status = 200, description = "Updated query record")),
    tag = "Query Engine"
)]
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(feedback): Json<Feedback>,
) -> ApiResult<Json<crate::models::QueryRecord>> {
    let record = state.orchestrator.submit_feedback(&id, &ctx.tenant, feedback).await?;
    Ok(Json(record))
}
