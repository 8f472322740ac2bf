use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::post;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ai_query_engine::config::Config;
use ai_query_engine::db;
use ai_query_engine::handlers;
use ai_query_engine::handlers::query_engine;
use ai_query_engine::models;
use ai_query_engine::services::{
    ExecutorContext, InMemoryDataSourceProvider, IntentClassifier, Orchestrator, QueryManager,
    ResultCache, SchemaRegistry, SqlGenerator,
};
use ai_query_engine::utils::{ScheduledExecutor, ScheduledTask};
use ai_query_engine::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::query_engine::execute_query,
        handlers::query_engine::explain_query,
        handlers::query_engine::submit_feedback,
    ),
    components(
        schemas(
            ai_query_engine::services::ExecuteQueryRequest,
            ai_query_engine::services::ExecuteQueryResponse,
            query_engine::ExplainQueryRequest,
            query_engine::ExplainQueryResponse,
            query_engine::SqlExplain,
            models::Intent,
            models::IntentCategory,
            models::OptimizationCategory,
            models::Feedback,
            models::QueryRecord,
            models::QueryStatus,
            models::PipelineEvent,
        )
    ),
    tags(
        (name = "Query Engine", description = "Natural-language-to-SQL pipeline: execute, explain, feedback"),
    )
)]
struct ApiDoc;

/// Periodic Result Cache TTL sweep, built on the same `ScheduledExecutor`
/// polling pattern used elsewhere for background maintenance tasks.
/// Reclaims expired cache entries that a quiet cache would otherwise
/// never purge (purging on write alone only happens on the next `Put`).
struct CacheSweepTask {
    cache: Arc<ResultCache>,
}

impl ScheduledTask for CacheSweepTask {
    fn run(&self) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send + '_>> {
        Box::pin(async move {
            let removed = self.cache.sweep_expired();
            if removed > 0 {
                tracing::debug!("cache sweep removed {} expired entries", removed);
            }
            Ok(())
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("ai-query-engine.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
        // Leak the guard: it must live for the process lifetime to keep
        // flushing the non-blocking writer, and main() never returns.
        Box::leak(Box::new(_guard));
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("AI Query Engine starting up");

    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("database pool created");

    let executor_ctx = ExecutorContext::new();
    let schema_registry = Arc::new(SchemaRegistry::new(executor_ctx.clone()));
    let intent_classifier = Arc::new(IntentClassifier::new(config.intent.min_confidence));
    let sql_generator = Arc::new(SqlGenerator::new(
        config.llm.providers.clone(),
        config.llm.primary_provider.as_deref(),
        config.llm.retry_attempts,
        Duration::from_millis(config.llm.retry_delay_ms),
    ));
    let result_cache = Arc::new(ResultCache::new(
        config.cache.max_entries,
        config.cache.eviction_fraction,
        config.cache.ttl_ms as i64,
    ));
    let query_manager = Arc::new(QueryManager::new(pool.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&schema_registry),
        Arc::clone(&intent_classifier),
        Arc::clone(&sql_generator),
        Arc::clone(&result_cache),
        Arc::clone(&query_manager),
        executor_ctx,
        Duration::from_millis(config.executor.batch_timeout_ms),
        Duration::from_millis(config.executor.stream_timeout_ms),
    ));

    let data_sources = Arc::new(InMemoryDataSourceProvider::new());

    let app_state = Arc::new(AppState {
        db: pool.clone(),
        config: config.clone(),
        orchestrator,
        data_sources,
    });

    let sweep_interval = Duration::from_millis(config.cache.sweep_interval_ms);
    let sweep_task = CacheSweepTask { cache: Arc::clone(&result_cache) };
    tokio::spawn(async move {
        ScheduledExecutor::new("result-cache-sweep", sweep_interval).start(sweep_task).await;
    });
    tracing::info!("result cache sweep scheduled every {:?}", sweep_interval);

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/query/execute", post(handlers::query_engine::execute_query))
        .route("/api/query/explain", post(handlers::query_engine::explain_query))
        .route("/api/query/:id/feedback", post(handlers::query_engine::submit_feedback))
        .route("/health", axum::routing::get(health_check))
        .route("/ready", axum::routing::get(ready_check))
        .with_state(Arc::clone(&app_state))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
