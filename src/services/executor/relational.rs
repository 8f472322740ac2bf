//! Relational executor: `relational-postgres` via `sqlx::PgPool`,
//! `relational-mysql` via the `mysql_async`-backed client. Both branches
//! open a pooled connection, run one statement under the caller's
//! timeout, and coerce every value to a portable JSON representation.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Column, Row};
use std::time::Instant;

use super::{ExecuteOptions, ExecutionOutcome, ExecutorAdapter, ExecutorContext};
use crate::models::{ColumnarResult, DataSource, DataSourceKind};
use crate::services::mysql_client::MySQLClient;
use crate::utils::error::{ApiError, ApiResult};

pub struct RelationalAdapter {
    data_source: DataSource,
    ctx: ExecutorContext,
}

impl RelationalAdapter {
    pub fn new(data_source: DataSource, ctx: ExecutorContext) -> Self {
        Self { data_source, ctx }
    }

    async fn execute_postgres(&self, sql: &str, opts: &ExecuteOptions) -> ApiResult<ColumnarResult> {
        let pool = match self.ctx.postgres_pools.get(&self.data_source.id) {
            Some(p) => (*p).clone(),
            None => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(20)
                    .connect(&self.data_source.connection.0)
                    .await
                    .map_err(|e| ApiError::execution_failed(format!("connect failed: {}", e)))?;
                self.ctx.postgres_pools.insert(self.data_source.id.clone(), pool.clone());
                pool
            },
        };

        opts.notify("running query", 0.1);
        let rows = sqlx::query(sql)
            .fetch_all(&pool)
            .await
            .map_err(|e| ApiError::execution_failed(format!("query failed: {}", e)))?;
        opts.notify("query complete", 0.9);

        let columns = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Vec::with_capacity(row.columns().len());
            for i in 0..row.columns().len() {
                record.push(pg_value_to_json(row, i));
            }
            data.push(record);
        }

        let row_count = data.len();
        Ok(ColumnarResult { columns, data, row_count })
    }

    async fn execute_mysql(&self, sql: &str, opts: &ExecuteOptions) -> ApiResult<ColumnarResult> {
        let pool = self.ctx.mysql_pools.get_pool(&self.data_source.id, &self.data_source.connection.0).await?;
        let client = MySQLClient::from_pool(pool);

        opts.notify("running query", 0.1);
        let (columns, raw_rows) = client.query_raw(sql).await?;
        opts.notify("query complete", 0.9);

        let data: Vec<Vec<Value>> = raw_rows
            .into_iter()
            .map(|row| row.into_iter().map(Value::String).collect())
            .collect();

        let row_count = data.len();
        Ok(ColumnarResult { columns, data, row_count })
    }
}

#[async_trait]
impl ExecutorAdapter for RelationalAdapter {
    async fn execute(&self, sql: &str, opts: &ExecuteOptions) -> ApiResult<ExecutionOutcome> {
        let start = Instant::now();

        let fut = async {
            match self.data_source.kind {
                DataSourceKind::RelationalPostgres => self.execute_postgres(sql, opts).await,
                DataSourceKind::RelationalMysql => self.execute_mysql(sql, opts).await,
                _ => unreachable!("RelationalAdapter only handles relational kinds"),
            }
        };

        let result = tokio::time::timeout(opts.timeout, fut)
            .await
            .map_err(|_| ApiError::execution_failed("query timed out"))??;

        Ok(ExecutionOutcome { result, elapsed_ms: start.elapsed().as_millis() as i64 })
    }
}

fn pg_value_to_json(row: &sqlx::postgres::PgRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return v.map(|d| Value::String(d.to_rfc3339())).unwrap_or(Value::Null);
    }
    row.try_get::<Option<String>, _>(idx).ok().flatten().map(Value::String).unwrap_or(Value::Null)
}
