//! Registry of host pools.
//!
//! # Responsibilities
//! - Own the host → pool mapping for the whole process
//! - Open pools (all-or-nothing dialing), replace existing ones atomically
//! - Tear pools down explicitly and at shutdown
//!
//! # Design Decisions
//! - Sharded concurrent map, so operations on independent hosts never
//!   contend on one coarse lock
//! - No implicit eviction and no TTL; pools exist exactly between an
//!   explicit open and an explicit close (or process shutdown)

use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::pool::connection::PooledConnection;
use crate::pool::host_pool::HostPool;

/// Error type for pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// One dial of a bulk open failed; the open fails as a whole.
    #[error("connection {attempt} to {host} failed: {source}")]
    Dial {
        host: String,
        attempt: usize,
        #[source]
        source: std::io::Error,
    },

    /// A send was attempted before a successful open for the host.
    #[error("no open connection pool for {host}")]
    NoPool { host: String },
}

/// Explicitly owned registry mapping host identifiers ("host:port") to
/// their connection pools.
#[derive(Debug)]
pub struct PoolRegistry {
    pools: DashMap<String, Arc<HostPool>>,
    connect_timeout: Duration,
}

impl PoolRegistry {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            pools: DashMap::new(),
            connect_timeout,
        }
    }

    /// Dial `count` fresh connections to `host` and install them as the
    /// host's pool, replacing (and closing) any existing pool. `count <= 0`
    /// is normalized to 1. If any dial fails, every connection opened so
    /// far in this call is closed and no pool is installed.
    pub async fn open(&self, host: &str, count: i64) -> Result<usize, PoolError> {
        let count = if count <= 0 { 1 } else { count as usize };

        let mut opened: Vec<PooledConnection> = Vec::with_capacity(count);
        for attempt in 1..=count {
            match PooledConnection::dial(host, self.connect_timeout).await {
                Ok(conn) => opened.push(conn),
                Err(source) => {
                    for mut conn in opened {
                        conn.shutdown().await;
                    }
                    return Err(PoolError::Dial {
                        host: host.to_string(),
                        attempt,
                        source,
                    });
                }
            }
        }

        let pool = Arc::new(HostPool::new(host.to_string(), opened));
        if let Some(replaced) = self.pools.insert(host.to_string(), pool) {
            replaced.close().await;
            tracing::info!(host = %host, "Replaced existing pool");
        }

        tracing::info!(host = %host, count = count, "Pool opened");
        Ok(count)
    }

    /// Look up the pool for `host`.
    pub fn get(&self, host: &str) -> Option<Arc<HostPool>> {
        self.pools.get(host).map(|entry| entry.value().clone())
    }

    /// Round-robin selection of the next connection for `host`.
    pub fn select_next(&self, host: &str) -> Result<Arc<Mutex<PooledConnection>>, PoolError> {
        let pool = self.get(host).ok_or_else(|| PoolError::NoPool {
            host: host.to_string(),
        })?;
        Ok(pool.select_next())
    }

    /// Close every connection in the named pool and remove it. Idempotent.
    pub async fn close_all(&self, host: &str) {
        if let Some((_, pool)) = self.pools.remove(host) {
            pool.close().await;
            tracing::info!(host = %host, "Pool removed");
        }
    }

    /// Shutdown-time teardown of every pool.
    pub async fn close_everything(&self) {
        let hosts: Vec<String> = self.pools.iter().map(|e| e.key().clone()).collect();
        for host in hosts {
            self.close_all(&host).await;
        }
    }

    /// Snapshot of (host, pool size) for the status surface.
    pub fn hosts(&self) -> Vec<(String, usize)> {
        self.pools
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn registry() -> PoolRegistry {
        PoolRegistry::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn open_normalizes_nonpositive_count() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let reg = registry();
        assert_eq!(reg.open(&host, 0).await.unwrap(), 1);
        assert_eq!(reg.open(&host, -4).await.unwrap(), 1);
        assert_eq!(reg.get(&host).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_open_installs_no_pool() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();
        drop(listener);

        let reg = registry();
        let err = reg.open(&host, 3).await.unwrap_err();
        match err {
            PoolError::Dial { attempt, .. } => assert_eq!(attempt, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(reg.get(&host).is_none());
        assert!(matches!(
            reg.select_next(&host),
            Err(PoolError::NoPool { .. })
        ));
    }

    #[tokio::test]
    async fn close_all_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host = listener.local_addr().unwrap().to_string();

        let reg = registry();
        reg.open(&host, 2).await.unwrap();
        reg.close_all(&host).await;
        reg.close_all(&host).await;
        assert!(reg.get(&host).is_none());
    }

    #[tokio::test]
    async fn close_everything_drains_registry() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let host_a = a.local_addr().unwrap().to_string();
        let host_b = b.local_addr().unwrap().to_string();

        let reg = registry();
        reg.open(&host_a, 1).await.unwrap();
        reg.open(&host_b, 2).await.unwrap();
        assert_eq!(reg.hosts().len(), 2);

        reg.close_everything().await;
        assert!(reg.hosts().is_empty());
    }
}
