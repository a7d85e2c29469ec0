//! Proxy listener: accept, classify, and hand off inbound connections.
//!
//! # Responsibilities
//! - Run the bounded accept loop (one task per inbound connection)
//! - Sniff the request head and classify CONNECT vs everything else
//! - Hand CONNECT connections to the tunnel relay as raw bytes
//! - Serve everything else through the HTTP/1.1 driver and the HTTP relay
//!
//! # Design Decisions
//! - The head is read once; tunnel connections consume it, relayed
//!   connections get it replayed via `Rewind`
//! - A failure on one connection never affects another

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::ProxyConfig;
use crate::net::{Listener, ListenerError, Rewind};
use crate::observability::metrics;
use crate::relay::http::{forward, RelayClient, RelaySettings};
use crate::relay::tunnel;

/// The proxy server: a bounded listener plus shared relay state.
pub struct ProxyServer {
    listener: Listener,
    state: ProxyState,
}

#[derive(Clone)]
struct ProxyState {
    client: RelayClient,
    settings: Arc<RelaySettings>,
    connect_timeout: Duration,
    tunnel_idle: Option<Duration>,
    max_head_bytes: usize,
    head_timeout: Duration,
}

impl ProxyServer {
    /// Bind the proxy listener and build the shared upstream client.
    pub async fn bind(config: &ProxyConfig) -> Result<Self, ListenerError> {
        let listener =
            Listener::bind(&config.proxy.bind_address, config.proxy.max_connections).await?;

        let client: RelayClient = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            listener,
            state: ProxyState {
                client,
                settings: Arc::new(RelaySettings::from_config(config)),
                connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
                tunnel_idle: match config.timeouts.tunnel_idle_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
                max_head_bytes: config.limits.max_head_bytes,
                head_timeout: Duration::from_secs(config.timeouts.request_secs),
            },
        })
    }

    /// Local address the proxy listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the accept loop until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        tracing::info!(
            max_connections = self.listener.max_connections(),
            "Proxy server started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer_addr, permit) = accepted?;
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, state).await {
                            tracing::debug!(
                                peer_addr = %peer_addr,
                                error = %e,
                                "Connection error"
                            );
                        }
                        drop(permit);
                    });
                }
            }
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

/// The sniffed request head: every byte read so far, and where the head
/// (terminated by CRLFCRLF) ends within it.
struct SniffedHead {
    bytes: Vec<u8>,
    head_len: usize,
}

enum RequestKind {
    /// CONNECT with its host:port target.
    Connect(String),
    /// A transport we cannot take over (HTTP/2 connection preface).
    UnsupportedTransport,
    /// Anything else: relay through the HTTP/1.1 driver.
    Relay,
}

async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    state: ProxyState,
) -> io::Result<()> {
    let head = read_head(&mut stream, state.max_head_bytes, state.head_timeout).await?;

    match classify(&head)? {
        RequestKind::Connect(target) => {
            let residual = head.bytes[head.head_len..].to_vec();
            match tunnel::run(
                stream,
                residual,
                &target,
                state.connect_timeout,
                state.tunnel_idle,
            )
            .await
            {
                Ok(stats) => {
                    metrics::record_tunnel(true, stats.client_to_target, stats.target_to_client);
                }
                Err(e) => {
                    metrics::record_tunnel(false, 0, 0);
                    tracing::debug!(
                        peer_addr = %peer_addr,
                        target = %target,
                        error = %e,
                        "Tunnel failed"
                    );
                }
            }
        }
        RequestKind::UnsupportedTransport => {
            tracing::warn!(peer_addr = %peer_addr, "{}", tunnel::TunnelError::UnsupportedTransport);
            write_plain(&mut stream, "500 Internal Server Error", "unsupported transport").await?;
        }
        RequestKind::Relay => {
            let rewound = Rewind::new(head.bytes, stream);
            let client = state.client.clone();
            let settings = Arc::clone(&state.settings);
            hyper::server::conn::http1::Builder::new()
                .serve_connection(
                    TokioIo::new(rewound),
                    service_fn(move |req| {
                        let client = client.clone();
                        let settings = Arc::clone(&settings);
                        async move { Ok::<_, Infallible>(forward(&client, &settings, req).await) }
                    }),
                )
                .await
                .map_err(io::Error::other)?;
        }
    }

    Ok(())
}

/// Read until the end of the request head (CRLFCRLF), bounded in size and
/// time. Bytes past the head are kept; they belong to the connection's
/// next protocol phase.
async fn read_head(
    stream: &mut TcpStream,
    max_bytes: usize,
    timeout: Duration,
) -> io::Result<SniffedHead> {
    tokio::time::timeout(timeout, async {
        let mut bytes = Vec::with_capacity(1024);
        let mut buf = [0u8; 1024];
        loop {
            if let Some(head_len) = find_head_end(&bytes) {
                return Ok(SniffedHead { bytes, head_len });
            }
            if bytes.len() >= max_bytes {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "request head too large",
                ));
            }
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before request head",
                ));
            }
            bytes.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "timed out reading request head"))?
}

fn find_head_end(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

fn classify(head: &SniffedHead) -> io::Result<RequestKind> {
    let line_end = head.bytes[..head.head_len]
        .windows(2)
        .position(|window| window == b"\r\n")
        .unwrap_or(head.head_len);
    let line = std::str::from_utf8(&head.bytes[..line_end])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-UTF-8 request line"))?;

    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();

    match method {
        "CONNECT" => Ok(RequestKind::Connect(target.to_string())),
        // HTTP/2 connection preface; we cannot take that transport over.
        "PRI" => Ok(RequestKind::UnsupportedTransport),
        _ => Ok(RequestKind::Relay),
    }
}

async fn write_plain(stream: &mut TcpStream, status_line: &str, body: &str) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
