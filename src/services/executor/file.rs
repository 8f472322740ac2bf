//! File-backed executor: `spreadsheet`, `csv`. Generated SQL targets a
//! single logical table, so the adapter materialises the source file
//! into an in-memory sqlite table named `data` and runs the SQL there —
//! reusing sqlite's query engine rather than hand-rolling one.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Column, Row, SqlitePool};
use std::time::Instant;

use super::{ExecuteOptions, ExecutionOutcome, ExecutorAdapter};
use crate::models::{ColumnarResult, DataSource};
use crate::utils::error::{ApiError, ApiResult};

pub struct FileAdapter {
    data_source: DataSource,
}

impl FileAdapter {
    pub fn new(data_source: DataSource) -> Self {
        Self { data_source }
    }

    async fn load_csv_text(&self) -> ApiResult<String> {
        let location = &self.data_source.connection.0;
        if location.starts_with("http://") || location.starts_with("https://") {
            reqwest::get(location)
                .await
                .map_err(|e| ApiError::execution_failed(format!("fetch failed: {}", e)))?
                .text()
                .await
                .map_err(|e| ApiError::execution_failed(format!("read body failed: {}", e)))
        } else {
            tokio::fs::read_to_string(location)
                .await
                .map_err(|e| ApiError::execution_failed(format!("read file failed: {}", e)))
        }
    }

    async fn materialise(&self, pool: &SqlitePool) -> ApiResult<()> {
        let text = self.load_csv_text().await?;
        let mut reader = csv::Reader::from_reader(text.as_bytes());

        let headers: Vec<String> =
            reader.headers().map_err(|e| ApiError::execution_failed(e.to_string()))?.iter().map(str::to_string).collect();

        if headers.is_empty() {
            return Err(ApiError::execution_failed("source file has no header row"));
        }

        let columns_ddl =
            headers.iter().map(|h| format!("\"{}\" TEXT", h)).collect::<Vec<_>>().join(", ");
        sqlx::query(&format!("CREATE TABLE data ({})", columns_ddl))
            .execute(pool)
            .await
            .map_err(|e| ApiError::execution_failed(format!("scratch table create failed: {}", e)))?;

        let placeholders = vec!["?"; headers.len()].join(", ");
        let insert_sql = format!("INSERT INTO data VALUES ({})", placeholders);

        for record in reader.records() {
            let record = record.map_err(|e| ApiError::execution_failed(e.to_string()))?;
            let mut query = sqlx::query(&insert_sql);
            for field in record.iter() {
                query = query.bind(field.to_string());
            }
            query
                .execute(pool)
                .await
                .map_err(|e| ApiError::execution_failed(format!("row insert failed: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ExecutorAdapter for FileAdapter {
    async fn execute(&self, sql: &str, opts: &ExecuteOptions) -> ApiResult<ExecutionOutcome> {
        let start = Instant::now();

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| ApiError::internal_error(format!("scratch db open failed: {}", e)))?;

        opts.notify("loading source file", 0.1);
        self.materialise(&pool).await?;

        opts.notify("running query", 0.6);
        let rows = tokio::time::timeout(opts.timeout, sqlx::query(sql).fetch_all(&pool))
            .await
            .map_err(|_| ApiError::execution_failed("query timed out"))?
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
                let value: Option<String> = row.try_get(i).ok();
                record.push(value.map(Value::String).unwrap_or(Value::Null));
            }
            data.push(record);
        }

        let row_count = data.len();
        let result = ColumnarResult { columns, data, row_count };
        pool.close().await;

        Ok(ExecutionOutcome { result, elapsed_ms: start.elapsed().as_millis() as i64 })
    }
}
