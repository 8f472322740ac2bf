//! Result Cache entry shape. The cache itself lives in
//! `services::result_cache` as a `DashMap`; this module only carries the
//! value type so it can be shared with the query manager and handlers.

use super::query::ColumnarResult;
use super::tenant::TenantId;
use crate::utils::fingerprint::QueryFingerprint;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: QueryFingerprint,
    pub tenant: TenantId,
    pub sql: String,
    pub result: ColumnarResult,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hits: u64,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
