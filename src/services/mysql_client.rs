//! Thin wrapper over `mysql_async` used by the relational executor adapter
//! for `relational-mysql` data sources.

use crate::utils::error::ApiError;
use mysql_async::{Pool, prelude::Queryable};
use std::sync::Arc;

#[derive(Clone)]
pub struct MySQLClient {
    pool: Arc<Pool>,
}

impl MySQLClient {
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Execute a read-only query and return results as (column_names, rows).
    pub async fn query_raw(&self, sql: &str) -> Result<(Vec<String>, Vec<Vec<String>>), ApiError> {
        let mut conn = self.pool.get_conn().await.map_err(|e| {
            tracing::error!("failed to get connection from pool: {}", e);
            ApiError::execution_failed(format!("failed to get connection: {}", e))
        })?;

        let rows: Vec<mysql_async::Row> = conn.query(sql).await.map_err(|e| {
            tracing::error!("MySQL query execution failed: {}", e);
            ApiError::execution_failed(format!("SQL execution failed: {}", e))
        })?;

        tracing::debug!("query returned {} rows", rows.len());
        drop(conn);

        Ok(process_query_result(rows))
    }
}

fn process_query_result(rows: Vec<mysql_async::Row>) -> (Vec<String>, Vec<Vec<String>>) {
    if rows.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let col_count = rows[0].columns_ref().len();
    let row_count = rows.len();

    let mut columns = Vec::with_capacity(col_count);
    let mut result_rows = Vec::with_capacity(row_count);

    for col in rows[0].columns_ref().iter() {
        columns.push(col.name_str().to_string());
    }

    for row in rows.iter() {
        let mut row_data = Vec::with_capacity(col_count);
        for col_idx in 0..col_count {
            row_data.push(value_to_string_optimized(&row[col_idx]));
        }
        result_rows.push(row_data);
    }

    (columns, result_rows)
}

// Optimized value conversion with minimal allocations.
fn value_to_string_optimized(value: &mysql_async::Value) -> String {
    use std::fmt::Write;
    match value {
        mysql_async::Value::NULL => "NULL".to_string(),
        mysql_async::Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).to_string(),
        },
        mysql_async::Value::Int(i) => {
            let mut s = String::with_capacity(12);
            let _ = write!(s, "{}", i);
            s
        },
        mysql_async::Value::UInt(u) => {
            let mut s = String::with_capacity(12);
            let _ = write!(s, "{}", u);
            s
        },
        mysql_async::Value::Float(f) => {
            let mut s = String::with_capacity(16);
            let _ = write!(s, "{}", f);
            s
        },
        mysql_async::Value::Double(d) => {
            let mut s = String::with_capacity(24);
            let _ = write!(s, "{}", d);
            s
        },
        mysql_async::Value::Date(year, month, day, hour, minute, second, _micro) => {
            format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, month, day, hour, minute, second)
        },
        mysql_async::Value::Time(_neg, days, hours, minutes, seconds, _micro) => {
            let total_hours = days * 24 + (*hours as u32);
            format!("{}:{:02}:{:02}", total_hours, minutes, seconds)
        },
    }
}
