//! Persistence pool for query history and analytics (the `queries`
//! table). SQLite by default; the URL is fully configurable so a
//! deployment can point at Postgres instead via the same
//! `sqlx::AnyPool`-free code path if `database.url` is swapped.

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new().max_connections(10).connect(database_url).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id TEXT PRIMARY KEY,
            tenant TEXT NOT NULL,
            data_source_id TEXT NOT NULL,
            user_id TEXT,
            natural_language TEXT NOT NULL,
            generated_sql TEXT,
            intent_label TEXT NOT NULL,
            confidence REAL NOT NULL,
            status TEXT NOT NULL,
            execution_ms INTEGER,
            row_count INTEGER,
            error_message TEXT,
            metadata TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queries_tenant ON queries(tenant, created_at)")
        .execute(&pool)
        .await?;

    Ok(pool)
}
