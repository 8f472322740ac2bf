//! Per–data-source MySQL connection pool cache.
//!
//! `DashMap` gives lock-free reads on the common path (pool already
//! exists); only the first connection for a given data source pays for
//! pool construction.

use crate::utils::error::{ApiError, ApiResult};
use dashmap::DashMap;
use mysql_async::{OptsBuilder, Pool, SslOpts};
use std::sync::Arc;

#[derive(Clone)]
pub struct MySQLPoolManager {
    pools: Arc<DashMap<String, Pool>>,
}

impl MySQLPoolManager {
    pub fn new() -> Self {
        Self { pools: Arc::new(DashMap::new()) }
    }
}

impl Default for MySQLPoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MySQLPoolManager {
    /// Get or create a pool for `data_source_id`, connecting with the DSN
    /// held in `connection` (`user:password@host:port/database`).
    pub async fn get_pool(&self, data_source_id: &str, connection: &str) -> ApiResult<Pool> {
        if let Some(pool) = self.pools.get(data_source_id) {
            return Ok(pool.clone());
        }

        let pool = Self::create_pool(connection)?;
        self.pools.insert(data_source_id.to_string(), pool.clone());
        tracing::info!(data_source_id, "created MySQL connection pool");
        Ok(pool)
    }

    pub async fn remove_pool(&self, data_source_id: &str) {
        if let Some((_, pool)) = self.pools.remove(data_source_id) {
            drop(pool);
            tracing::info!(data_source_id, "removed MySQL connection pool");
        }
    }

    pub async fn clear_all(&self) {
        self.pools.clear();
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    fn create_pool(connection: &str) -> ApiResult<Pool> {
        let (credentials, host_part) = connection
            .split_once('@')
            .ok_or_else(|| ApiError::internal_error("malformed MySQL connection string"))?;
        let (user, pass) = credentials.split_once(':').unwrap_or((credentials, ""));
        let (host_port, db_name) = host_part.split_once('/').unwrap_or((host_part, ""));
        let (host, port) = host_port.split_once(':').unwrap_or((host_port, "3306"));
        let port: u16 = port.parse().unwrap_or(3306);

        let opts = OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(user))
            .pass(Some(pass))
            .db_name(if db_name.is_empty() { None } else { Some(db_name) })
            .prefer_socket(false)
            .ssl_opts(None::<SslOpts>)
            .tcp_keepalive(Some(30_000_u32))
            .tcp_nodelay(true)
            .pool_opts(
                mysql_async::PoolOpts::default()
                    .with_constraints(
                        mysql_async::PoolConstraints::new(2, 20)
                            .ok_or_else(|| ApiError::internal_error("invalid pool constraints"))?,
                    )
                    .with_inactive_connection_ttl(std::time::Duration::from_secs(300))
                    .with_ttl_check_interval(std::time::Duration::from_secs(60)),
            );

        Ok(Pool::new(opts))
    }
}
