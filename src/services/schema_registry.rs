//! Schema Registry: resolves a `DataSource` into a typed
//! `Schema`. Relational kinds introspect live via the executor adapter's
//! connection; SaaS kinds return a schema built into the engine;
//! file-backed kinds return the frozen `schema_hint` on the data source.
//!
//! Schemas are memoised per `(data_source_id, last_synced_at)` behind a
//! per-key lock so a cache miss triggers exactly one introspection, not
//! one per waiting caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::{Cardinality, Column, DataSource, DataSourceKind, Relationship, Schema, Table};
use crate::services::executor::{ExecuteOptions, ExecutorContext, create_adapter};
use crate::utils::error::{ApiError, ApiResult};

const SCHEMA_CACHE_CAP: usize = 256;

#[derive(Clone)]
struct CachedSchema {
    schema: Schema,
    synced_at: DateTime<Utc>,
}

pub struct SchemaRegistry {
    cache: DashMap<String, CachedSchema>,
    /// One lock per in-flight key so concurrent callers for the same
    /// data source coalesce onto a single introspection.
    locks: DashMap<String, Arc<Mutex<()>>>,
    executor_ctx: ExecutorContext,
}

impl SchemaRegistry {
    pub fn new(executor_ctx: ExecutorContext) -> Self {
        Self { cache: DashMap::new(), locks: DashMap::new(), executor_ctx }
    }

    pub async fn get_schema(&self, data_source: &DataSource) -> ApiResult<Schema> {
        if let Some(cached) = self.cache.get(&data_source.id) {
            if cached.synced_at == data_source.last_synced_at {
                return Ok(cached.schema.clone());
            }
        }

        let key_lock = self
            .locks
            .entry(data_source.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = key_lock.lock().await;

        // Re-check after acquiring the lock: another waiter may have
        // already filled the cache while we queued for it.
        if let Some(cached) = self.cache.get(&data_source.id) {
            if cached.synced_at == data_source.last_synced_at {
                return Ok(cached.schema.clone());
            }
        }

        let schema = self.resolve(data_source).await?;
        self.evict_if_full();
        self.cache
            .insert(data_source.id.clone(), CachedSchema { schema: schema.clone(), synced_at: data_source.last_synced_at });

        Ok(schema)
    }

    fn evict_if_full(&self) {
        if self.cache.len() < SCHEMA_CACHE_CAP {
            return;
        }
        // Small bound, simple LRU stand-in: drop an arbitrary entry
        // rather than tracking access order for a cache this size.
        if let Some(key) = self.cache.iter().next().map(|e| e.key().clone()) {
            self.cache.remove(&key);
        }
    }

    async fn resolve(&self, data_source: &DataSource) -> ApiResult<Schema> {
        match data_source.kind {
            DataSourceKind::RelationalPostgres | DataSourceKind::RelationalMysql => {
                self.introspect_relational(data_source).await
            },
            DataSourceKind::EcommerceOrders | DataSourceKind::Payments | DataSourceKind::Accounting => {
                Ok(builtin_saas_schema(data_source.kind))
            },
            DataSourceKind::Spreadsheet | DataSourceKind::Csv => {
                let hint = data_source
                    .schema_hint
                    .as_deref()
                    .ok_or_else(|| ApiError::internal_error("file data source missing schema_hint"))?;
                serde_json::from_str(hint)
                    .map_err(|e| ApiError::internal_error(format!("invalid schema_hint: {}", e)))
            },
        }
    }

    async fn introspect_relational(&self, data_source: &DataSource) -> ApiResult<Schema> {
        let adapter = create_adapter(data_source, &self.executor_ctx);
        let list_tables_sql = match data_source.kind {
            DataSourceKind::RelationalMysql => {
                "SELECT table_name FROM information_schema.tables WHERE table_schema = database()"
            },
            _ => "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
        };

        let opts = ExecuteOptions::batch(Duration::from_secs(10));
        let table_rows = adapter.execute(list_tables_sql, &opts).await?;

        let mut tables = Vec::with_capacity(table_rows.result.data.len());
        for row in &table_rows.result.data {
            let Some(name) = row.first().and_then(|v| v.as_str()) else { continue };
            tables.push(self.introspect_table(adapter.as_ref(), data_source.kind, name).await?);
        }

        let relationships = infer_foreign_key_relationships(&tables);
        Ok(Schema { tables, relationships })
    }

    async fn introspect_table(
        &self,
        adapter: &dyn crate::services::executor::ExecutorAdapter,
        kind: DataSourceKind,
        table_name: &str,
    ) -> ApiResult<Table> {
        let columns_sql = match kind {
            DataSourceKind::RelationalMysql => format!(
                "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = '{}'",
                table_name
            ),
            _ => format!(
                "SELECT column_name, data_type FROM information_schema.columns WHERE table_name = '{}'",
                table_name
            ),
        };

        let opts = ExecuteOptions::batch(Duration::from_secs(10));
        let column_rows = adapter.execute(&columns_sql, &opts).await?;
        let columns: Vec<Column> = column_rows
            .result
            .data
            .iter()
            .filter_map(|row| {
                let name = row.first()?.as_str()?.to_string();
                let data_type = row.get(1)?.as_str()?.to_string();
                Some(Column { name, data_type, nullable: true })
            })
            .collect();

        let sample_sql = format!("SELECT * FROM {} LIMIT {}", table_name, crate::models::MAX_SAMPLE_ROWS);
        let sample_rows = match adapter.execute(&sample_sql, &opts).await {
            Ok(outcome) => outcome
                .result
                .data
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.as_str().unwrap_or_default().to_string()).collect())
                .collect(),
            Err(_) => Vec::new(),
        };

        Ok(Table { name: table_name.to_string(), columns, sample_rows })
    }
}

/// Relationships aren't discoverable from `information_schema` alone
/// without a second round-trip per adapter kind; left empty until a
/// foreign-key introspection query is added per dialect.
fn infer_foreign_key_relationships(_tables: &[Table]) -> Vec<Relationship> {
    Vec::new()
}

/// Fixed schemas for the SaaS kinds this engine ships built-in support
/// for, mirroring the shape their vendor APIs actually expose.
fn builtin_saas_schema(kind: DataSourceKind) -> Schema {
    match kind {
        DataSourceKind::EcommerceOrders => Schema {
            tables: vec![
                Table {
                    name: "orders".to_string(),
                    columns: vec![
                        col("id", "bigint"),
                        col("customer_id", "bigint"),
                        col("status", "text"),
                        col("total_amount", "numeric"),
                        col("created_at", "timestamp"),
                    ],
                    sample_rows: vec![],
                },
                Table {
                    name: "order_items".to_string(),
                    columns: vec![
                        col("id", "bigint"),
                        col("order_id", "bigint"),
                        col("product_id", "bigint"),
                        col("quantity", "integer"),
                        col("unit_price", "numeric"),
                    ],
                    sample_rows: vec![],
                },
                Table {
                    name: "customers".to_string(),
                    columns: vec![
                        col("id", "bigint"),
                        col("email", "text"),
                        col("country", "text"),
                        col("signup_at", "timestamp"),
                    ],
                    sample_rows: vec![],
                },
            ],
            relationships: vec![
                Relationship {
                    from: "orders.customer_id".to_string(),
                    to: "customers.id".to_string(),
                    cardinality: Cardinality::ManyToMany,
                },
                Relationship {
                    from: "order_items.order_id".to_string(),
                    to: "orders.id".to_string(),
                    cardinality: Cardinality::OneToMany,
                },
            ],
        },
        DataSourceKind::Payments => Schema {
            tables: vec![Table {
                name: "transactions".to_string(),
                columns: vec![
                    col("id", "bigint"),
                    col("order_id", "bigint"),
                    col("amount", "numeric"),
                    col("currency", "text"),
                    col("status", "text"),
                    col("processed_at", "timestamp"),
                ],
                sample_rows: vec![],
            }],
            relationships: vec![],
        },
        DataSourceKind::Accounting => Schema {
            tables: vec![
                Table {
                    name: "invoices".to_string(),
                    columns: vec![
                        col("id", "bigint"),
                        col("account_id", "bigint"),
                        col("amount_due", "numeric"),
                        col("due_date", "date"),
                        col("status", "text"),
                    ],
                    sample_rows: vec![],
                },
                Table {
                    name: "ledger_entries".to_string(),
                    columns: vec![
                        col("id", "bigint"),
                        col("account_id", "bigint"),
                        col("entry_type", "text"),
                        col("amount", "numeric"),
                        col("recorded_at", "timestamp"),
                    ],
                    sample_rows: vec![],
                },
            ],
            relationships: vec![Relationship {
                from: "ledger_entries.account_id".to_string(),
                to: "invoices.account_id".to_string(),
                cardinality: Cardinality::ManyToMany,
            }],
        },
        _ => Schema::default(),
    }
}

fn col(name: &str, data_type: &str) -> Column {
    Column { name: name.to_string(), data_type: data_type.to_string(), nullable: true }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecommerce_schema_links_orders_to_customers() {
        let schema = builtin_saas_schema(DataSourceKind::EcommerceOrders);
        assert!(schema.table("orders").is_some());
        assert!(schema.relationships.iter().any(|r| r.from == "orders.customer_id"));
    }
}
