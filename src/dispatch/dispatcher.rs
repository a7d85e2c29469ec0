//! Exchange execution and concurrent dispatch.
//!
//! # Responsibilities
//! - Run one request/response exchange over a pooled connection
//! - Fan a raw request out across a pool with bounded concurrency
//! - Collect results in task index order and aggregate failures

use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWriteExt, BufReader};

use crate::dispatch::response::{read_response, ExchangeResponse};
use crate::dispatch::{DispatchError, ExchangeLimits};
use crate::pool::{HostPool, PooledConnection};

/// Write `raw` to the connection, then read and parse exactly one response
/// from it. The whole exchange is bounded by the configured timeout.
pub async fn send_and_receive(
    conn: &mut PooledConnection,
    raw: &[u8],
    limits: &ExchangeLimits,
) -> Result<ExchangeResponse, DispatchError> {
    let start = Instant::now();

    if !conn.is_open() {
        return Err(DispatchError::Write(io::Error::new(
            io::ErrorKind::NotConnected,
            "connection is closed",
        )));
    }

    let exchange = async {
        conn.stream_mut()
            .write_all(raw)
            .await
            .map_err(DispatchError::Write)?;
        let mut reader = BufReader::new(conn.stream_mut());
        read_response(&mut reader, limits).await
    };

    let mut response = tokio::time::timeout(limits.exchange_timeout, exchange)
        .await
        .map_err(|_| {
            DispatchError::Read(io::Error::new(io::ErrorKind::TimedOut, "exchange timed out"))
        })??;

    response.elapsed = start.elapsed();
    Ok(response)
}

/// Dispatch `raw` concurrently against `pool`. Concurrency is clamped to
/// `[1, pool size]`; each task round-robin-selects its own connection and
/// holds that slot's lock for the duration of its exchange. Results come
/// back ordered by task index. Every task runs to completion; if any
/// fail, the whole call fails with every failure message aggregated.
pub async fn dispatch_concurrent(
    pool: &Arc<HostPool>,
    raw: Vec<u8>,
    concurrency: i64,
    limits: &ExchangeLimits,
) -> Result<Vec<ExchangeResponse>, DispatchError> {
    let size = pool.len();
    let clamped = if concurrency <= 0 {
        1
    } else {
        (concurrency as usize).min(size)
    };
    tracing::debug!(
        host = %pool.host(),
        requested = concurrency,
        concurrency = clamped,
        pool_size = size,
        "Dispatching"
    );

    let raw = Arc::new(raw);
    let mut tasks = Vec::with_capacity(clamped);
    for _ in 0..clamped {
        // Selection happens here, in task index order, so k <= n tasks are
        // guaranteed k distinct connections.
        let slot = pool.select_next();
        let raw = Arc::clone(&raw);
        let limits = limits.clone();
        tasks.push(tokio::spawn(async move {
            let mut conn = slot.lock().await;
            send_and_receive(&mut conn, &raw, &limits).await
        }));
    }

    let total = tasks.len();
    let mut responses = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for (index, task) in tasks.into_iter().enumerate() {
        match task.await {
            Ok(Ok(response)) => responses.push(response),
            Ok(Err(e)) => failures.push(format!("request {}: {e}", index + 1)),
            Err(e) => failures.push(format!("request {}: task failed: {e}", index + 1)),
        }
    }

    if failures.is_empty() {
        Ok(responses)
    } else {
        Err(DispatchError::Aggregate { total, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve connections that read `request_len` bytes per request and
    /// answer each with a fixed response, keeping the connection open.
    async fn start_fixed_server(request_len: usize, response: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; request_len];
                    while socket.read_exact(&mut buf).await.is_ok() {
                        if socket.write_all(response.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    /// Accept connections and close them immediately.
    async fn start_slamming_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                drop(socket);
            }
        });
        addr
    }

    const RAW: &[u8] = b"GET / HTTP/1.1\r\nHost: t\r\nContent-Length: 0\r\n\r\n";
    const REPLY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

    #[tokio::test]
    async fn exchange_reuses_the_connection() {
        let addr = start_fixed_server(RAW.len(), REPLY).await;
        let mut conn = PooledConnection::dial(&addr.to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        let limits = ExchangeLimits::default();

        for _ in 0..3 {
            let resp = send_and_receive(&mut conn, RAW, &limits).await.unwrap();
            assert_eq!(resp.status, 200);
            assert_eq!(resp.body, b"ok");
            assert!(resp.elapsed > Duration::ZERO);
        }
    }

    #[tokio::test]
    async fn concurrency_is_clamped_to_pool_size() {
        let addr = start_fixed_server(RAW.len(), REPLY).await;
        let host = addr.to_string();
        let mut conns = Vec::new();
        for _ in 0..2 {
            conns.push(
                PooledConnection::dial(&host, Duration::from_secs(5))
                    .await
                    .unwrap(),
            );
        }
        let pool = Arc::new(HostPool::new(host, conns));

        let responses = dispatch_concurrent(&pool, RAW.to_vec(), 5, &ExchangeLimits::default())
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);

        let responses = dispatch_concurrent(&pool, RAW.to_vec(), -1, &ExchangeLimits::default())
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_aggregated_per_task() {
        let addr = start_slamming_server().await;
        let host = addr.to_string();
        let mut conns = Vec::new();
        for _ in 0..2 {
            conns.push(
                PooledConnection::dial(&host, Duration::from_secs(5))
                    .await
                    .unwrap(),
            );
        }
        let pool = Arc::new(HostPool::new(host, conns));

        let err = dispatch_concurrent(&pool, RAW.to_vec(), 2, &ExchangeLimits::default())
            .await
            .unwrap_err();
        match err {
            DispatchError::Aggregate { total, failures } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("request 1:"));
                assert!(failures[1].starts_with("request 2:"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn send_on_closed_connection_is_a_write_failure() {
        let addr = start_fixed_server(RAW.len(), REPLY).await;
        let mut conn = PooledConnection::dial(&addr.to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        conn.shutdown().await;

        let err = send_and_receive(&mut conn, RAW, &ExchangeLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Write(_)));
    }
}
