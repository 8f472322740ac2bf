//! `QueryRecord` and everything persisted alongside it: the columnar
//! execution payload, the typed metadata extension slot, the
//! optimization heuristic's output, and caller feedback.

use super::tenant::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Columnar result payload shared by the cache and the executor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ColumnarResult {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationCategory {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl OptimizationCategory {
    pub fn for_score(score: i32) -> Self {
        match score {
            s if s >= 80 => Self::Excellent,
            s if s >= 60 => Self::Good,
            s if s >= 40 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptimizationAnalysis {
    pub score: i32,
    pub category: OptimizationCategory,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct Feedback {
    pub helpful: Option<bool>,
    pub accurate: Option<bool>,
    pub rating: Option<u8>,
    pub comments: Option<String>,
}

/// A typed extension slot in place of free-form JSON: everything the
/// Intent Classifier and SQL Generator contributed, plus whatever the
/// Query Manager later appends.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct QueryMetadata {
    #[serde(default)]
    pub entities: std::collections::HashMap<String, Value>,
    #[serde(default)]
    pub timeframe: Option<Value>,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub optimizations: Vec<String>,
    #[serde(default)]
    pub optimization_analysis: Option<OptimizationAnalysis>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, FromRow)]
pub struct QueryRecordRow {
    pub id: String,
    pub tenant: String,
    pub data_source_id: String,
    pub user_id: Option<String>,
    pub natural_language: String,
    pub generated_sql: Option<String>,
    pub intent_label: String,
    pub confidence: f64,
    pub status: QueryStatus,
    pub execution_ms: Option<i64>,
    pub row_count: Option<i64>,
    pub error_message: Option<String>,
    pub metadata: String, // JSON-encoded QueryMetadata
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRecord {
    pub id: String,
    pub tenant: TenantId,
    pub data_source_id: String,
    pub user: Option<String>,
    pub natural_language: String,
    pub generated_sql: Option<String>,
    pub intent_label: String,
    pub confidence: f64,
    pub status: QueryStatus,
    pub execution_ms: Option<i64>,
    pub row_count: Option<i64>,
    pub error_message: Option<String>,
    pub metadata: QueryMetadata,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<QueryRecordRow> for QueryRecord {
    type Error = serde_json::Error;

    fn try_from(row: QueryRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            tenant: TenantId(row.tenant),
            data_source_id: row.data_source_id,
            user: row.user_id,
            natural_language: row.natural_language,
            generated_sql: row.generated_sql,
            intent_label: row.intent_label,
            confidence: row.confidence,
            status: row.status,
            execution_ms: row.execution_ms,
            row_count: row.row_count,
            error_message: row.error_message,
            metadata: serde_json::from_str(&row.metadata)?,
            created_at: row.created_at,
        })
    }
}

/// History listing filters.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HistoryFilters {
    pub data_source_id: Option<String>,
    pub status: Option<QueryStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsWindow {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
    #[serde(rename = "1y")]
    OneYear,
}

impl AnalyticsWindow {
    pub fn duration(self) -> chrono::Duration {
        match self {
            Self::OneDay => chrono::Duration::days(1),
            Self::SevenDays => chrono::Duration::days(7),
            Self::ThirtyDays => chrono::Duration::days(30),
            Self::NinetyDays => chrono::Duration::days(90),
            Self::OneYear => chrono::Duration::days(365),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, Default)]
pub struct LatencyBuckets {
    pub under_1s: u64,
    pub one_to_5s: u64,
    pub over_5s: u64,
}

impl LatencyBuckets {
    pub fn record(&mut self, execution_ms: i64) {
        match execution_ms {
            ms if ms < 1_000 => self.under_1s += 1,
            ms if ms <= 5_000 => self.one_to_5s += 1,
            _ => self.over_5s += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, Default)]
pub struct Analytics {
    pub total_queries: u64,
    pub success_rate: f64,
    pub intent_histogram: std::collections::HashMap<String, u64>,
    pub data_source_histogram: std::collections::HashMap<String, u64>,
    pub per_day_counts: std::collections::BTreeMap<String, u64>,
    pub latency: LatencyBuckets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimization_category_boundaries() {
        assert_eq!(OptimizationCategory::for_score(100), OptimizationCategory::Excellent);
        assert_eq!(OptimizationCategory::for_score(80), OptimizationCategory::Excellent);
        assert_eq!(OptimizationCategory::for_score(79), OptimizationCategory::Good);
        assert_eq!(OptimizationCategory::for_score(60), OptimizationCategory::Good);
        assert_eq!(OptimizationCategory::for_score(40), OptimizationCategory::Fair);
        assert_eq!(OptimizationCategory::for_score(39), OptimizationCategory::Poor);
    }

    #[test]
    fn latency_bucket_boundaries() {
        let mut b = LatencyBuckets::default();
        b.record(999);
        b.record(1000);
        b.record(5000);
        b.record(5001);
        assert_eq!(b.under_1s, 1);
        assert_eq!(b.one_to_5s, 2);
        assert_eq!(b.over_5s, 1);
    }
}
