//! Data source lookup: the core never manages `DataSource` lifecycle —
//! that's the external management interface's job — but the three
//! request handlers still need to turn a caller-supplied `(tenant,
//! data_source_id)` pair into the `DataSource` the rest of the pipeline
//! operates on. This is that seam, kept as thin as an in-process
//! registry (same `DashMap` keyed lookup shape as `SchemaRegistry`'s
//! cache).

use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::{DataSource, TenantId};
use crate::utils::error::{ApiError, ApiResult};

#[async_trait]
pub trait DataSourceProvider: Send + Sync {
    async fn get(&self, tenant: &TenantId, data_source_id: &str) -> ApiResult<DataSource>;
}

/// Reference provider for deployments that register sources out-of-band
/// (config file, admin call, test fixture) rather than through a live
/// external catalog. Tenant-scoped: a lookup under the wrong tenant is
/// indistinguishable from a missing source.
pub struct InMemoryDataSourceProvider {
    sources: DashMap<(TenantId, String), DataSource>,
}

impl InMemoryDataSourceProvider {
    pub fn new() -> Self {
        Self { sources: DashMap::new() }
    }

    pub fn register(&self, data_source: DataSource) {
        self.sources.insert((data_source.tenant.clone(), data_source.id.clone()), data_source);
    }
}

impl Default for InMemoryDataSourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSourceProvider for InMemoryDataSourceProvider {
    async fn get(&self, tenant: &TenantId, data_source_id: &str) -> ApiResult<DataSource> {
        self.sources
            .get(&(tenant.clone(), data_source_id.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::not_found(format!("data source {} not found", data_source_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionSecret, DataSourceKind};

    fn source(tenant: &str, id: &str) -> DataSource {
        DataSource {
            id: id.to_string(),
            tenant: TenantId::from(tenant),
            kind: DataSourceKind::RelationalPostgres,
            display_name: "warehouse".to_string(),
            connection: ConnectionSecret::default(),
            schema_hint: None,
            last_synced_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn lookup_is_scoped_to_the_registering_tenant() {
        let provider = InMemoryDataSourceProvider::new();
        provider.register(source("tenant-a", "ds1"));

        assert!(provider.get(&TenantId::from("tenant-a"), "ds1").await.is_ok());
        let err = provider.get(&TenantId::from("tenant-b"), "ds1").await.unwrap_err();
        assert_eq!(err.kind(), "data_source_not_found");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let provider = InMemoryDataSourceProvider::new();
        let err = provider.get(&TenantId::from("tenant-a"), "missing").await.unwrap_err();
        assert_eq!(err.kind(), "data_source_not_found");
    }
}
