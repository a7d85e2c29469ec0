//! A single pooled outbound connection.
//!
//! # Responsibilities
//! - Dial one TCP connection to a destination host under a timeout
//! - Track connection state (Open → Closed)
//! - Generate unique connection IDs for tracing

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle state of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is open and may carry exchanges.
    Open,
    /// Connection has been shut down; writes are rejected.
    Closed,
}

/// An exclusively-owned, full-duplex byte stream bound to one destination
/// host. Owned by its pool for its lifetime; handed to at most one exchange
/// at a time via the pool's per-slot lock.
#[derive(Debug)]
pub struct PooledConnection {
    id: ConnectionId,
    host: String,
    stream: TcpStream,
    state: ConnectionState,
}

impl PooledConnection {
    /// Dial a fresh connection to `host` ("host:port") under `timeout`.
    pub async fn dial(host: &str, timeout: Duration) -> io::Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(host))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

        let conn = Self {
            id: ConnectionId::next(),
            host: host.to_string(),
            stream,
            state: ConnectionState::Open,
        };
        tracing::debug!(id = %conn.id, host = %conn.host, "Connection dialed");
        Ok(conn)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Exclusive access to the underlying stream for one exchange.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Shut down the connection. Idempotent; after this, writes fail.
    pub async fn shutdown(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        let _ = self.stream.shutdown().await;
        tracing::debug!(id = %self.id, host = %self.host, "Connection closed");
    }
}
