//! Tenant and data-source identity.
//!
//! The core never mutates a `DataSource`'s credentials and never resolves
//! a tenant's identity itself — both are established by the external
//! caller before `ExecuteQuery` is invoked. What lives here is the
//! read-only shape the pipeline needs to address a source and keep every
//! downstream structure scoped to the right tenant.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Opaque tenant identifier. A newtype rather than a bare `String` so that
/// a cache key or query built from the wrong field can't typecheck.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum DataSourceKind {
    RelationalPostgres,
    RelationalMysql,
    Spreadsheet,
    EcommerceOrders,
    Payments,
    Accounting,
    Csv,
}

impl DataSourceKind {
    /// SQL dialect generated SQL is written against. Relational kinds use
    /// their own native dialect; every other kind is generated against a
    /// PostgreSQL-compatible dialect.
    pub fn dialect(self) -> SqlDialect {
        match self {
            Self::RelationalPostgres => SqlDialect::Postgres,
            Self::RelationalMysql => SqlDialect::MySql,
            Self::Spreadsheet | Self::EcommerceOrders | Self::Payments | Self::Accounting
            | Self::Csv => SqlDialect::Postgres,
        }
    }

    pub fn is_saas(self) -> bool {
        matches!(self, Self::EcommerceOrders | Self::Payments | Self::Accounting)
    }

    pub fn is_file_backed(self) -> bool {
        matches!(self, Self::Spreadsheet | Self::Csv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    MySql,
}

/// Opaque connection credentials. Never serialized, never logged; cleared
/// from any structure that escapes the span of a single `Execute` call.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSecret(pub String);

impl std::fmt::Display for ConnectionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<redacted>")
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DataSource {
    pub id: String,
    pub tenant: TenantId,
    pub kind: DataSourceKind,
    pub display_name: String,
    #[sqlx(skip)]
    pub connection: ConnectionSecret,
    /// Frozen schema override for spreadsheet/csv kinds. `None` for kinds
    /// whose schema is derived live (relational) or built in (SaaS).
    pub schema_hint: Option<String>,
    pub last_synced_at: chrono::DateTime<chrono::Utc>,
}

/// Caller-facing projection with the tenant already verified and the
/// secret stripped — this is what the rest of the pipeline passes around.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataSourceInfo {
    pub id: String,
    pub kind: DataSourceKind,
    pub display_name: String,
}

impl From<&DataSource> for DataSourceInfo {
    fn from(ds: &DataSource) -> Self {
        Self { id: ds.id.clone(), kind: ds.kind, display_name: ds.display_name.clone() }
    }
}
