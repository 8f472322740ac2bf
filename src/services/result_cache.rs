//! Result Cache: fingerprint-keyed, bounded, best-effort.
//! `DashMap` gives concurrent readers and serialised per-shard writers;
//! eviction briefly takes an exclusive pass over entries sorted by age.

use chrono::Utc;
use dashmap::DashMap;

use crate::models::{CacheEntry, ColumnarResult, TenantId};
use crate::utils::fingerprint::QueryFingerprint;

pub struct ResultCache {
    entries: DashMap<QueryFingerprint, CacheEntry>,
    max_entries: usize,
    eviction_fraction: f32,
    default_ttl: chrono::Duration,
}

impl ResultCache {
    pub fn new(max_entries: usize, eviction_fraction: f32, default_ttl_ms: i64) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            eviction_fraction,
            default_ttl: chrono::Duration::milliseconds(default_ttl_ms),
        }
    }

    pub fn get(&self, fingerprint: &QueryFingerprint) -> Option<CacheEntry> {
        let now = Utc::now();
        let entry = self.entries.get(fingerprint)?;
        if entry.is_expired(now) {
            drop(entry);
            self.entries.remove(fingerprint);
            return None;
        }
        let mut entry = entry.clone();
        entry.hits += 1;
        self.entries.insert(*fingerprint, entry.clone());
        Some(entry)
    }

    /// Writes are best-effort: callers must never let a failure here
    /// propagate past `ExecuteQuery`.
    pub fn put(&self, fingerprint: QueryFingerprint, tenant: TenantId, sql: String, result: ColumnarResult) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest_fraction();
        }
        self.purge_expired();

        let now = Utc::now();
        let entry = CacheEntry {
            fingerprint,
            tenant,
            sql,
            result,
            cached_at: now,
            expires_at: now + self.default_ttl,
            hits: 0,
        };
        self.entries.insert(fingerprint, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest_fraction(&self) {
        let to_evict = ((self.entries.len() as f32) * self.eviction_fraction).ceil() as usize;
        if to_evict == 0 {
            return;
        }

        let mut by_age: Vec<(QueryFingerprint, chrono::DateTime<Utc>)> =
            self.entries.iter().map(|e| (*e.key(), e.value().cached_at)).collect();
        by_age.sort_by_key(|(_, created)| *created);

        for (fingerprint, _) in by_age.into_iter().take(to_evict) {
            self.entries.remove(&fingerprint);
        }
    }

    fn purge_expired(&self) {
        self.sweep_expired();
    }

    /// Removes every expired entry and returns how many were dropped.
    /// Called on the write path per-insert and from the periodic cache
    /// sweep task so a cache that stops receiving writes still reclaims
    /// its expired entries.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<QueryFingerprint> =
            self.entries.iter().filter(|e| e.value().is_expired(now)).map(|e| *e.key()).collect();
        let count = expired.len();
        for fingerprint in expired {
            self.entries.remove(&fingerprint);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> ColumnarResult {
        ColumnarResult { columns: vec!["a".to_string()], data: vec![], row_count: 0 }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResultCache::new(10, 0.1, 3_600_000);
        let fp = QueryFingerprint::new("t1", "d1", "top customers");
        cache.put(fp, TenantId::from("t1"), "SELECT 1".to_string(), result());
        assert!(cache.get(&fp).is_some());
    }

    #[test]
    fn eviction_keeps_size_at_or_below_cap() {
        let cache = ResultCache::new(10, 0.5, 3_600_000);
        for i in 0..11 {
            let fp = QueryFingerprint::new("t1", "d1", &format!("query {}", i));
            cache.put(fp, TenantId::from("t1"), "SELECT 1".to_string(), result());
        }
        assert!(cache.len() <= 10);
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = ResultCache::new(10, 0.1, 0);
        let fp = QueryFingerprint::new("t1", "d1", "top customers");
        cache.put(fp, TenantId::from("t1"), "SELECT 1".to_string(), result());
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get(&fp).is_none());
    }
}
