//! Query Manager and Optimization Analysis: persists
//! `QueryRecord`s, serves history/analytics queries, and scores
//! generated SQL with the optimisation heuristic.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{
    Analytics, AnalyticsWindow, Feedback, HistoryFilters, OptimizationAnalysis,
    OptimizationCategory, QueryMetadata, QueryRecord, QueryRecordRow, QueryStatus, TenantId,
};
use crate::utils::error::{ApiError, ApiResult};
use crate::utils::fingerprint::{first_keyword, normalise};

pub struct QueryManager {
    pool: SqlitePool,
}

impl QueryManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, mut record: QueryRecord) -> ApiResult<QueryRecord> {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }

        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| ApiError::internal_error(format!("metadata encode failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO queries
                (id, tenant, data_source_id, user_id, natural_language, generated_sql,
                 intent_label, confidence, status, execution_ms, row_count, error_message,
                 metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.tenant.0.clone())
        .bind(&record.data_source_id)
        .bind(&record.user)
        .bind(&record.natural_language)
        .bind(&record.generated_sql)
        .bind(&record.intent_label)
        .bind(record.confidence)
        .bind(status_str(record.status))
        .bind(record.execution_ms)
        .bind(record.row_count)
        .bind(&record.error_message)
        .bind(&metadata_json)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn get(&self, id: &str, tenant: &TenantId) -> ApiResult<Option<QueryRecord>> {
        let row = sqlx::query_as::<_, QueryRecordRow>(
            "SELECT * FROM queries WHERE id = ? AND tenant = ?",
        )
        .bind(id)
        .bind(&tenant.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueryRecord::try_from)
            .transpose()
            .map_err(|e| ApiError::internal_error(format!("corrupt metadata: {}", e)))
    }

    pub async fn history(
        &self,
        tenant: &TenantId,
        filters: &HistoryFilters,
    ) -> ApiResult<Vec<QueryRecord>> {
        let page = filters.page.unwrap_or(1).max(1);
        let page_size = filters.page_size.unwrap_or(20).min(200);
        let offset = (page - 1) * page_size;

        let mut sql = String::from("SELECT * FROM queries WHERE tenant = ?");
        if filters.data_source_id.is_some() {
            sql.push_str(" AND data_source_id = ?");
        }
        if filters.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, QueryRecordRow>(&sql).bind(&tenant.0);
        if let Some(ds) = &filters.data_source_id {
            query = query.bind(ds);
        }
        if let Some(status) = filters.status {
            query = query.bind(status_str(status));
        }
        query = query.bind(page_size as i64).bind(offset as i64);

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(QueryRecord::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::internal_error(format!("corrupt metadata: {}", e)))
    }

    /// `FindSimilar`: recent completed queries sharing the first
    /// extracted keyword of `text`.
    pub async fn find_similar(
        &self,
        text: &str,
        tenant: &TenantId,
        data_source_id: &str,
        k: u32,
    ) -> ApiResult<Vec<QueryRecord>> {
        let Some(keyword) = first_keyword(text) else { return Ok(Vec::new()) };

        let rows = sqlx::query_as::<_, QueryRecordRow>(
            r#"
            SELECT * FROM queries
            WHERE tenant = ? AND data_source_id = ? AND status = 'completed'
              AND lower(natural_language) LIKE '%' || ? || '%'
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(&tenant.0)
        .bind(data_source_id)
        .bind(keyword)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(QueryRecord::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::internal_error(format!("corrupt metadata: {}", e)))
    }

    pub async fn analytics(&self, tenant: &TenantId, window: AnalyticsWindow) -> ApiResult<Analytics> {
        let since = chrono::Utc::now() - window.duration();
        let rows = sqlx::query_as::<_, QueryRecordRow>(
            "SELECT * FROM queries WHERE tenant = ? AND created_at >= ?",
        )
        .bind(&tenant.0)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut analytics = Analytics::default();
        analytics.total_queries = rows.len() as u64;

        let mut completed = 0u64;
        for row in &rows {
            if row.status == QueryStatus::Completed {
                completed += 1;
            }
            *analytics.intent_histogram.entry(row.intent_label.clone()).or_insert(0) += 1;
            *analytics.data_source_histogram.entry(row.data_source_id.clone()).or_insert(0) += 1;
            let day = row.created_at.format("%Y-%m-%d").to_string();
            *analytics.per_day_counts.entry(day).or_insert(0) += 1;
            if let Some(ms) = row.execution_ms {
                analytics.latency.record(ms);
            }
        }

        analytics.success_rate =
            if rows.is_empty() { 0.0 } else { completed as f64 / rows.len() as f64 };

        Ok(analytics)
    }

    pub async fn optimization_report(
        &self,
        tenant: &TenantId,
        window: AnalyticsWindow,
    ) -> ApiResult<Vec<(String, OptimizationAnalysis)>> {
        let since = chrono::Utc::now() - window.duration();
        let rows = sqlx::query_as::<_, QueryRecordRow>(
            "SELECT * FROM queries WHERE tenant = ? AND created_at >= ? AND status = 'completed' AND generated_sql IS NOT NULL",
        )
        .bind(&tenant.0)
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let sql = row.generated_sql.clone()?;
                Some((row.id.clone(), score_sql(&sql)))
            })
            .collect())
    }

    pub async fn update_feedback(
        &self,
        id: &str,
        tenant: &TenantId,
        feedback: Feedback,
    ) -> ApiResult<QueryRecord> {
        let mut record = self
            .get(id, tenant)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("query {} not found", id)))?;

        record.metadata.feedback = Some(feedback);
        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| ApiError::internal_error(format!("metadata encode failed: {}", e)))?;

        sqlx::query("UPDATE queries SET metadata = ? WHERE id = ? AND tenant = ?")
            .bind(&metadata_json)
            .bind(id)
            .bind(&tenant.0)
            .execute(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn delete(&self, id: &str, tenant: &TenantId) -> ApiResult<()> {
        sqlx::query("DELETE FROM queries WHERE id = ? AND tenant = ?")
            .bind(id)
            .bind(&tenant.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn status_str(status: QueryStatus) -> &'static str {
    match status {
        QueryStatus::Pending => "pending",
        QueryStatus::Completed => "completed",
        QueryStatus::Failed => "failed",
    }
}

/// Optimisation heuristic: starts at 100, deducts for each pattern that
/// fires, never blocks execution.
pub fn score_sql(sql: &str) -> OptimizationAnalysis {
    let normalised = normalise(sql);
    let mut score: i32 = 100;
    let mut suggestions = Vec::new();

    if normalised.contains("select *") {
        score -= 20;
        suggestions.push("Select only the columns you need instead of SELECT *".to_string());
    }
    if has_wildcard_prefix_like(&normalised) {
        score -= 15;
        suggestions.push("Avoid leading-wildcard LIKE patterns; they can't use an index".to_string());
    }
    if !normalised.contains("limit") && !normalised.contains("top ") {
        score -= 25;
        suggestions.push("Add a LIMIT to bound the result set".to_string());
    }
    if normalised.contains("order by") && !normalised.contains("limit") {
        score -= 10;
        suggestions.push("ORDER BY without LIMIT sorts the entire result set".to_string());
    }

    let score = score.max(0);
    OptimizationAnalysis { score, category: OptimizationCategory::for_score(score), suggestions }
}

fn has_wildcard_prefix_like(normalised: &str) -> bool {
    normalised.contains("like '%") || normalised.contains("like \"%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_star_without_limit_scores_poorly() {
        let analysis = score_sql("SELECT * FROM orders");
        assert_eq!(analysis.score, 100 - 20 - 25);
        assert_eq!(analysis.category, OptimizationCategory::Fair);
    }

    #[test]
    fn well_formed_query_scores_excellent() {
        let analysis = score_sql("SELECT id, total FROM orders ORDER BY created_at LIMIT 10");
        assert_eq!(analysis.score, 100);
        assert_eq!(analysis.category, OptimizationCategory::Excellent);
    }

    #[test]
    fn leading_wildcard_like_is_penalised() {
        let analysis = score_sql("SELECT id FROM orders WHERE name LIKE '%smith' LIMIT 10");
        assert_eq!(analysis.score, 85);
    }
}
