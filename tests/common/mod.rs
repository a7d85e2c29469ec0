//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Counters exposed by stub backends.
#[derive(Debug, Default)]
pub struct BackendStats {
    /// Connections accepted over the backend's lifetime.
    pub accepted: AtomicUsize,
    /// Connections currently open.
    pub active: AtomicUsize,
}

#[allow(dead_code)]
impl BackendStats {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Start a keep-alive HTTP backend that echoes each request body back.
/// Connections stay open between requests, like a real origin would.
#[allow(dead_code)]
pub async fn start_echo_backend() -> (SocketAddr, Arc<BackendStats>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = Arc::new(BackendStats::default());
    let accept_stats = stats.clone();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let stats = accept_stats.clone();
            stats.accepted.fetch_add(1, Ordering::SeqCst);
            stats.active.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let _ = serve_echo(socket).await;
                stats.active.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    (addr, stats)
}

/// Serve one connection: read requests, echo each body back with a 200,
/// and keep the connection open until the peer closes it.
async fn serve_echo(mut socket: TcpStream) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    loop {
        let head_end = loop {
            if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            let mut chunk = [0u8; 1024];
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buffer[..head_end]).into_owned();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);

        while buffer.len() < head_end + content_length {
            let mut chunk = [0u8; 1024];
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&chunk[..n]);
        }

        let body = buffer[head_end..head_end + content_length].to_vec();
        buffer.drain(..head_end + content_length);

        let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
        socket.write_all(response.as_bytes()).await?;
        socket.write_all(&body).await?;
    }
}

/// Start a raw TCP server that echoes bytes until the peer closes.
#[allow(dead_code)]
pub async fn start_raw_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start an origin that answers every connection with a fixed raw response.
#[allow(dead_code)]
pub async fn start_fixed_origin(raw: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let raw = Arc::new(raw);
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let raw = raw.clone();
            tokio::spawn(async move {
                // Wait for the request head before answering.
                let mut buffer = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                    }
                }
                let _ = socket.write_all(&raw).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address that refuses connections.
#[allow(dead_code)]
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Poll `condition` until it holds or a few seconds elapse.
#[allow(dead_code)]
pub async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
