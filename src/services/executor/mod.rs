//! Executor Adapter: one implementation per `DataSourceKind`,
//! selected by the same trait-object-plus-factory shape used elsewhere in
//! this codebase for per-kind strategy dispatch.

mod file;
mod relational;
mod saas;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{ColumnarResult, DataSource, DataSourceKind};
use crate::services::mysql_pool_manager::MySQLPoolManager;
use crate::utils::error::ApiResult;

/// `{message, progress}` checkpoint relayed from the adapter up to the
/// orchestrator, which remaps it onto the pipeline's own progress scale.
#[derive(Debug, Clone)]
pub struct AdapterProgress {
    pub message: String,
    /// 0.0-1.0
    pub progress: f32,
}

pub type ProgressCallback = Arc<dyn Fn(AdapterProgress) + Send + Sync>;

pub struct ExecuteOptions {
    pub timeout: Duration,
    pub on_progress: Option<ProgressCallback>,
}

impl ExecuteOptions {
    pub fn batch(timeout: Duration) -> Self {
        Self { timeout, on_progress: None }
    }

    pub fn streaming(timeout: Duration, on_progress: ProgressCallback) -> Self {
        Self { timeout, on_progress: Some(on_progress) }
    }

    fn notify(&self, message: impl Into<String>, progress: f32) {
        if let Some(cb) = &self.on_progress {
            cb(AdapterProgress { message: message.into(), progress });
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub result: ColumnarResult,
    pub elapsed_ms: i64,
}

#[async_trait]
pub trait ExecutorAdapter: Send + Sync {
    async fn execute(&self, sql: &str, opts: &ExecuteOptions) -> ApiResult<ExecutionOutcome>;
}

/// One pool manager shared by every relational adapter instance; cheap to
/// clone (it's an `Arc<DashMap<..>>` internally).
#[derive(Clone)]
pub struct ExecutorContext {
    pub mysql_pools: MySQLPoolManager,
    pub postgres_pools: Arc<dashmap::DashMap<String, sqlx::PgPool>>,
}

impl ExecutorContext {
    pub fn new() -> Self {
        Self { mysql_pools: MySQLPoolManager::new(), postgres_pools: Arc::new(dashmap::DashMap::new()) }
    }
}

impl Default for ExecutorContext {
    fn default() -> Self {
        Self::new()
    }
}

pub fn create_adapter(data_source: &DataSource, ctx: &ExecutorContext) -> Box<dyn ExecutorAdapter> {
    match data_source.kind {
        DataSourceKind::RelationalPostgres | DataSourceKind::RelationalMysql => {
            Box::new(relational::RelationalAdapter::new(data_source.clone(), ctx.clone()))
        },
        DataSourceKind::EcommerceOrders | DataSourceKind::Payments | DataSourceKind::Accounting => {
            Box::new(saas::SaasAdapter::new(data_source.clone()))
        },
        DataSourceKind::Spreadsheet | DataSourceKind::Csv => {
            Box::new(file::FileAdapter::new(data_source.clone()))
        },
    }
}
