//! SaaS executor: `ecommerce-orders`, `payments`, `accounting`. These
//! vendors expose a query API rather than a SQL socket, so generated SQL
//! is forwarded as a structured query to `{endpoint}/query` and the
//! vendor is expected to execute it against the synthesised schema.
//! Unsupported SQL features come back as a vendor error and are
//! surfaced as `AdapterError`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{ExecuteOptions, ExecutionOutcome, ExecutorAdapter};
use crate::models::{ColumnarResult, DataSource};
use crate::utils::error::{ApiError, ApiResult};

pub struct SaasAdapter {
    data_source: DataSource,
    http: Client,
}

impl SaasAdapter {
    pub fn new(data_source: DataSource) -> Self {
        let http = Client::builder().build().expect("build http client");
        Self { data_source, http }
    }
}

#[derive(Debug, Serialize)]
struct VendorQueryRequest<'a> {
    sql: &'a str,
}

#[derive(Debug, Deserialize)]
struct VendorQueryResponse {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[async_trait]
impl ExecutorAdapter for SaasAdapter {
    async fn execute(&self, sql: &str, opts: &ExecuteOptions) -> ApiResult<ExecutionOutcome> {
        let start = Instant::now();
        let (endpoint, api_key) = self
            .data_source
            .connection
            .0
            .split_once("::")
            .ok_or_else(|| ApiError::internal_error("malformed vendor connection string"))?;
        let url = format!("{}/query", endpoint.trim_end_matches('/'));

        opts.notify("submitting query to vendor API", 0.2);

        let response = tokio::time::timeout(
            opts.timeout,
            self.http
                .post(&url)
                .bearer_auth(api_key)
                .timeout(opts.timeout)
                .json(&VendorQueryRequest { sql })
                .send(),
        )
        .await
        .map_err(|_| ApiError::execution_failed("vendor query timed out"))?
        .map_err(|e| ApiError::execution_failed(format!("vendor request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::execution_failed(format!("vendor error {}: {}", status, body)));
        }

        opts.notify("parsing vendor response", 0.8);
        let parsed: VendorQueryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::execution_failed(format!("malformed vendor response: {}", e)))?;

        let row_count = parsed.rows.len();
        let result = ColumnarResult { columns: parsed.columns, data: parsed.rows, row_count };

        Ok(ExecutionOutcome { result, elapsed_ms: start.elapsed().as_millis() as i64 })
    }
}

pub const DEFAULT_VENDOR_TIMEOUT: Duration = Duration::from_secs(30);
