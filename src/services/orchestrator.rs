//! Pipeline Orchestrator: sequences schema resolution, intent
//! classification, SQL generation, validation, and execution, enforces
//! cache and failover policy, and emits `PipelineEvent`s at each stage.
//! One instance is shared across tenants; one `execute` call is one
//! logical task and never retains state across invocations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    ColumnarResult, DataSource, DataSourceKind, Feedback, Intent, OptimizationAnalysis,
    QueryMetadata, QueryRecord, QueryStatus, TenantId,
};
use crate::services::executor::{ExecuteOptions, ExecutorContext, create_adapter};
use crate::services::intent_classifier::IntentClassifier;
use crate::services::llm::SqlGenerator;
use crate::services::query_manager::{QueryManager, score_sql};
use crate::services::result_cache::ResultCache;
use crate::services::schema_registry::SchemaRegistry;
use crate::services::streaming::EventSender;
use crate::utils::error::{ApiError, ApiResult};
use crate::utils::fingerprint::QueryFingerprint;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ExecuteQueryRequest {
    #[validate(length(min = 5, max = 1000))]
    pub natural_language: String,
    pub data_source_id: String,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub explain: bool,
    #[serde(default)]
    pub streaming: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueryResponse {
    pub success: bool,
    pub data: Vec<Vec<serde_json::Value>>,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub execution_time: i64,
    pub cached: bool,
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    pub optimizations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    pub data_source_type: DataSourceKind,
}

pub struct Orchestrator {
    schema_registry: Arc<SchemaRegistry>,
    intent_classifier: Arc<IntentClassifier>,
    sql_generator: Arc<SqlGenerator>,
    result_cache: Arc<ResultCache>,
    query_manager: Arc<QueryManager>,
    executor_ctx: ExecutorContext,
    batch_timeout: Duration,
    stream_timeout: Duration,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema_registry: Arc<SchemaRegistry>,
        intent_classifier: Arc<IntentClassifier>,
        sql_generator: Arc<SqlGenerator>,
        result_cache: Arc<ResultCache>,
        query_manager: Arc<QueryManager>,
        executor_ctx: ExecutorContext,
        batch_timeout: Duration,
        stream_timeout: Duration,
    ) -> Self {
        Self {
            schema_registry,
            intent_classifier,
            sql_generator,
            result_cache,
            query_manager,
            executor_ctx,
            batch_timeout,
            stream_timeout,
        }
    }

    /// Runs intent classification and SQL generation only, for
    /// `ExplainQuery` — never reaches the executor.
    pub async fn explain(
        &self,
        data_source: &DataSource,
        natural_language: &str,
    ) -> ApiResult<(Intent, ApiResult<crate::services::llm::GeneratedSql>)> {
        let intent = self.intent_classifier.classify(natural_language);
        if intent.confidence < self.intent_classifier.min_confidence() {
            return Ok((intent, Err(ApiError::IntentLowConfidence {
                suggestions: self.intent_classifier.suggestions_for(natural_language),
            })));
        }

        let schema = self.schema_registry.get_schema(data_source).await?;
        let generated = self
            .sql_generator
            .generate(natural_language, &intent, &schema, data_source.kind)
            .await
            .map_err(ApiError::from);

        Ok((intent, generated))
    }

    pub async fn execute(
        &self,
        tenant: TenantId,
        user: Option<String>,
        data_source: DataSource,
        req: ExecuteQueryRequest,
        sender: Option<EventSender>,
        cancellation: CancellationToken,
    ) -> ApiResult<ExecuteQueryResponse> {
        let start = Instant::now();
        let stream_id = Uuid::new_v4().to_string();
        emit(&sender, &cancellation, crate::models::PipelineEvent::connection(&stream_id)).await;

        let timeout = if req.streaming { self.stream_timeout } else { self.batch_timeout };

        match self.run(tenant.clone(), user, data_source, req, &sender, &cancellation, timeout, start).await {
            Ok(response) => Ok(response),
            Err(err) => {
                let event = match &err {
                    ApiError::IntentLowConfidence { suggestions } => {
                        crate::models::PipelineEvent::error_with_suggestions(
                            pipeline_step_for(&err),
                            err.to_string(),
                            err.kind(),
                            suggestions.clone(),
                        )
                    },
                    _ => crate::models::PipelineEvent::error(
                        pipeline_step_for(&err),
                        err.to_string(),
                        err.kind(),
                    ),
                };
                emit(&sender, &cancellation, event).await;
                Err(err)
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        tenant: TenantId,
        user: Option<String>,
        data_source: DataSource,
        req: ExecuteQueryRequest,
        sender: &Option<EventSender>,
        cancellation: &CancellationToken,
        timeout: Duration,
        start: Instant,
    ) -> ApiResult<ExecuteQueryResponse> {
        req.validate().map_err(|e| ApiError::validation_error(e.to_string()))?;

        emit(sender, cancellation, crate::models::PipelineEvent::progress("intent_detection", "classifying intent", 10))
            .await;
        check_cancelled(cancellation)?;

        let intent = self.intent_classifier.classify(&req.natural_language);
        if intent.confidence < self.intent_classifier.min_confidence() {
            let suggestions = self.intent_classifier.suggestions_for(&req.natural_language);
            self.persist_failed(&tenant, &user, &data_source, &req, &intent, "intent confidence too low")
                .await;
            return Err(ApiError::IntentLowConfidence { suggestions });
        }
        emit(
            sender,
            cancellation,
            crate::models::PipelineEvent::progress_with(
                "intent_detection",
                "intent classified",
                20,
                json!({ "intent": intent }),
            ),
        )
        .await;

        let fingerprint =
            QueryFingerprint::new(&tenant.0, &data_source.id, &req.natural_language);

        if req.use_cache {
            emit(sender, cancellation, crate::models::PipelineEvent::progress("cache_check", "checking cache", 30))
                .await;
            check_cancelled(cancellation)?;

            if let Some(hit) = self.lookup_cache(&fingerprint, &tenant, &data_source, &req).await? {
                emit(sender, cancellation, crate::models::PipelineEvent::progress("cache_hit", "cache hit", 90)).await;

                let record = QueryRecord {
                    id: Uuid::new_v4().to_string(),
                    tenant: tenant.clone(),
                    data_source_id: data_source.id.clone(),
                    user: user.clone(),
                    natural_language: req.natural_language.clone(),
                    generated_sql: Some("CACHED".to_string()),
                    intent_label: format!("{:?}", intent.category),
                    confidence: intent.confidence as f64,
                    status: QueryStatus::Completed,
                    execution_ms: Some(start.elapsed().as_millis() as i64),
                    row_count: Some(hit.row_count as i64),
                    error_message: None,
                    metadata: QueryMetadata::default(),
                    created_at: Utc::now(),
                };
                let saved = self.query_manager.save(record).await.ok();

                let response = ExecuteQueryResponse {
                    success: true,
                    data: hit.data.clone(),
                    columns: hit.columns.clone(),
                    row_count: hit.row_count,
                    execution_time: start.elapsed().as_millis() as i64,
                    cached: true,
                    intent: intent.clone(),
                    sql: req.explain.then(|| "CACHED".to_string()),
                    optimizations: Vec::new(),
                    query_id: saved.map(|r| r.id),
                    data_source_type: data_source.kind,
                };

                emit(
                    sender,
                    cancellation,
                    crate::models::PipelineEvent::result(
                        "completed",
                        json!({ "rowCount": response.row_count, "cached": true }),
                    ),
                )
                .await;

                return Ok(response);
            }
        }

        emit(sender, cancellation, crate::models::PipelineEvent::progress("sql_generation", "generating SQL", 40))
            .await;
        check_cancelled(cancellation)?;

        let schema = self.schema_registry.get_schema(&data_source).await.map_err(|e| {
            ApiError::execution_failed(format!("schema unavailable: {}", e))
        })?;

        let generated = self
            .sql_generator
            .generate(&req.natural_language, &intent, &schema, data_source.kind)
            .await
            .map_err(|e| {
                ApiError::execution_failed(format!("all LLM providers failed: {}", e))
            });

        let generated = match generated {
            Ok(g) => g,
            Err(e) => {
                self.persist_failed(&tenant, &user, &data_source, &req, &intent, &e.to_string()).await;
                return Err(e);
            },
        };

        emit(
            sender,
            cancellation,
            crate::models::PipelineEvent::progress_with(
                "sql_generation",
                "SQL generated",
                60,
                json!({ "explanation": generated.explanation }),
            ),
        )
        .await;

        let formatted = crate::services::sql_validator::validate_and_format(&generated.sql, data_source.kind.dialect());
        let formatted_sql = match formatted {
            Ok(sql) => sql,
            Err(e) => {
                self.persist_failed(&tenant, &user, &data_source, &req, &intent, &e.to_string()).await;
                return Err(e);
            },
        };

        emit(sender, cancellation, crate::models::PipelineEvent::progress("sql_execution", "executing query", 70))
            .await;
        check_cancelled(cancellation)?;

        let adapter = create_adapter(&data_source, &self.executor_ctx);

        // Adapter callbacks are synchronous; bridge them onto the async
        // event channel via an unbounded queue drained by a forwarding
        // task, remapping the adapter's own [0.0,1.0] progress onto the
        // pipeline's [70,90] window.
        let relay = if req.streaming && sender.is_some() {
            let (progress_tx, mut progress_rx) =
                tokio::sync::mpsc::unbounded_channel::<crate::services::executor::AdapterProgress>();
            let relay_sender = sender.clone();
            let relay_cancellation = cancellation.clone();
            let forward = tokio::spawn(async move {
                while let Some(progress) = progress_rx.recv().await {
                    let mapped = 70 + (progress.progress.clamp(0.0, 1.0) * 20.0).round() as u8;
                    emit(
                        &relay_sender,
                        &relay_cancellation,
                        crate::models::PipelineEvent::progress_with(
                            "sql_execution",
                            progress.message,
                            mapped,
                            json!({}),
                        ),
                    )
                    .await;
                }
            });
            let callback: crate::services::executor::ProgressCallback =
                Arc::new(move |progress| {
                    let _ = progress_tx.send(progress);
                });
            Some((callback, forward))
        } else {
            None
        };

        let exec_opts = match &relay {
            Some((callback, _)) => ExecuteOptions::streaming(timeout, callback.clone()),
            None => ExecuteOptions::batch(timeout),
        };

        let outcome = adapter.execute(&formatted_sql, &exec_opts).await;
        drop(exec_opts);

        if let Some((callback, forward)) = relay {
            drop(callback);
            let _ = forward.await;
        }

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                self.persist_failed(&tenant, &user, &data_source, &req, &intent, &e.to_string()).await;
                return Err(e);
            },
        };

        emit(sender, cancellation, crate::models::PipelineEvent::progress("saving_results", "saving results", 95))
            .await;

        let optimization_analysis = score_sql(&formatted_sql);
        let metadata = QueryMetadata {
            entities: intent.entities.clone(),
            timeframe: intent
                .timeframe
                .as_ref()
                .map(|t| serde_json::to_value(t).unwrap_or(serde_json::Value::Null)),
            metrics: intent.metrics.clone(),
            dimensions: intent.dimensions.clone(),
            columns: outcome.result.columns.clone(),
            optimization_analysis: Some(optimization_analysis.clone()),
            ..Default::default()
        };

        let record = QueryRecord {
            id: Uuid::new_v4().to_string(),
            tenant: tenant.clone(),
            data_source_id: data_source.id.clone(),
            user,
            natural_language: req.natural_language.clone(),
            generated_sql: Some(formatted_sql.clone()),
            intent_label: format!("{:?}", intent.category),
            confidence: intent.confidence as f64,
            status: QueryStatus::Completed,
            execution_ms: Some(outcome.elapsed_ms),
            row_count: Some(outcome.result.row_count as i64),
            error_message: None,
            metadata,
            created_at: Utc::now(),
        };
        let saved = self.query_manager.save(record).await.ok();

        self.result_cache.put(fingerprint, tenant, formatted_sql.clone(), outcome.result.clone());

        let response = ExecuteQueryResponse {
            success: true,
            data: outcome.result.data,
            columns: outcome.result.columns,
            row_count: outcome.result.row_count,
            execution_time: start.elapsed().as_millis() as i64,
            cached: false,
            intent,
            sql: req.explain.then_some(formatted_sql),
            optimizations: optimization_analysis.suggestions,
            query_id: saved.map(|r| r.id),
            data_source_type: data_source.kind,
        };

        emit(
            sender,
            cancellation,
            crate::models::PipelineEvent::result(
                "completed",
                json!({ "rowCount": response.row_count, "queryId": response.query_id }),
            ),
        )
        .await;

        Ok(response)
    }

    async fn lookup_cache(
        &self,
        fingerprint: &QueryFingerprint,
        tenant: &TenantId,
        data_source: &DataSource,
        req: &ExecuteQueryRequest,
    ) -> ApiResult<Option<ColumnarResult>> {
        if let Some(entry) = self.result_cache.get(fingerprint) {
            return Ok(Some(entry.result));
        }

        let similar = self.query_manager.find_similar(&req.natural_language, tenant, &data_source.id, 5).await?;
        for candidate in similar {
            let candidate_fp =
                QueryFingerprint::new(&tenant.0, &data_source.id, &candidate.natural_language);
            if let Some(entry) = self.result_cache.get(&candidate_fp) {
                return Ok(Some(entry.result));
            }
        }

        Ok(None)
    }

    async fn persist_failed(
        &self,
        tenant: &TenantId,
        user: &Option<String>,
        data_source: &DataSource,
        req: &ExecuteQueryRequest,
        intent: &Intent,
        error_message: &str,
    ) {
        let record = QueryRecord {
            id: Uuid::new_v4().to_string(),
            tenant: tenant.clone(),
            data_source_id: data_source.id.clone(),
            user: user.clone(),
            natural_language: req.natural_language.clone(),
            generated_sql: None,
            intent_label: format!("{:?}", intent.category),
            confidence: intent.confidence as f64,
            status: QueryStatus::Failed,
            execution_ms: None,
            row_count: None,
            error_message: Some(error_message.to_string()),
            metadata: QueryMetadata::default(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.query_manager.save(record).await {
            tracing::error!("failed to persist failed query record: {}", e);
        }
    }

    pub async fn submit_feedback(
        &self,
        id: &str,
        tenant: &TenantId,
        feedback: Feedback,
    ) -> ApiResult<QueryRecord> {
        self.query_manager.update_feedback(id, tenant, feedback).await
    }
}

async fn emit(sender: &Option<EventSender>, cancellation: &CancellationToken, event: crate::models::PipelineEvent) {
    if let Some(sender) = sender {
        if sender.send(event).await.is_err() {
            cancellation.cancel();
        }
    }
}

fn check_cancelled(cancellation: &CancellationToken) -> ApiResult<()> {
    if cancellation.is_cancelled() { Err(ApiError::Cancelled) } else { Ok(()) }
}

fn pipeline_step_for(err: &ApiError) -> &'static str {
    match err {
        ApiError::IntentLowConfidence { .. } => "intent_detection",
        ApiError::SQLGenerationFailed(_) | ApiError::UnsafeSQL(_) | ApiError::ExecutionFailed(_) => {
            "sql_execution"
        },
        ApiError::Cancelled => "cancelled",
        _ => "pipeline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_use_cache_is_true() {
        let req: ExecuteQueryRequest =
            serde_json::from_str(r#"{"natural_language":"top customers","data_source_id":"d1"}"#)
                .unwrap();
        assert!(req.use_cache);
        assert!(!req.explain);
        assert!(!req.streaming);
    }
}
