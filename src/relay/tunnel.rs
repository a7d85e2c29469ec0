//! CONNECT tunnel relay.
//!
//! # Responsibilities
//! - Dial the CONNECT target
//! - Acknowledge the tunnel with the literal 200 line
//! - Splice bytes in both directions until either side closes
//!
//! State machine per tunnel: Received → Dialing → Tunneling → Closed.
//! Dial failure closes the client without any acknowledgment.

use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Acknowledgment written to the client once the target is dialed.
pub const ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Copy buffer size per direction.
const COPY_BUF_SIZE: usize = 8192;

/// Lifecycle of one tunnel, tracked for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Inbound transport taken over; target not yet dialed.
    Received,
    /// TCP connect to the target in progress.
    Dialing,
    /// Both copy directions running.
    Tunneling,
    /// Both copy directions finished; no further I/O.
    Closed,
}

/// Bytes moved through a finished tunnel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunnelStats {
    pub client_to_target: u64,
    pub target_to_client: u64,
}

/// Error type for tunnel relay operations.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The CONNECT target was not a dialable host:port.
    #[error("invalid CONNECT target {0:?}")]
    InvalidTarget(String),

    /// The target could not be dialed; the client is closed unacknowledged.
    #[error("dial to {target} failed: {source}")]
    Dial {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The inbound transport cannot be taken over for tunneling.
    #[error("inbound transport cannot be taken over for tunneling")]
    UnsupportedTransport,

    /// I/O failure after the tunnel was established.
    #[error("tunnel i/o failed: {0}")]
    Io(#[from] io::Error),
}

/// Run one tunnel to completion. `residual` holds client bytes read past
/// the CONNECT head by the listener; they are forwarded to the target
/// ahead of everything else.
pub async fn run(
    mut client: TcpStream,
    residual: Vec<u8>,
    target: &str,
    connect_timeout: Duration,
    idle_timeout: Option<Duration>,
) -> Result<TunnelStats, TunnelError> {
    let mut state = TunnelState::Received;
    tracing::trace!(target = %target, state = ?state, "Tunnel request received");
    if !target.contains(':') {
        return Err(TunnelError::InvalidTarget(target.to_string()));
    }

    state = TunnelState::Dialing;
    tracing::debug!(target = %target, state = ?state, "Dialing tunnel target");
    let dialed = tokio::time::timeout(connect_timeout, TcpStream::connect(target)).await;
    let mut upstream = match dialed {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            let _ = client.shutdown().await;
            return Err(TunnelError::Dial {
                target: target.to_string(),
                source,
            });
        }
        Err(_) => {
            let _ = client.shutdown().await;
            return Err(TunnelError::Dial {
                target: target.to_string(),
                source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            });
        }
    };

    client.write_all(ESTABLISHED).await?;
    if !residual.is_empty() {
        upstream.write_all(&residual).await?;
    }

    state = TunnelState::Tunneling;
    tracing::debug!(target = %target, state = ?state, "Tunnel established");

    let (mut client_read, mut client_write) = client.split();
    let (mut upstream_read, mut upstream_write) = upstream.split();

    let client_to_target = copy_direction(
        &mut client_read,
        &mut upstream_write,
        idle_timeout,
        residual.len() as u64,
    );
    let target_to_client = copy_direction(&mut upstream_read, &mut client_write, idle_timeout, 0);

    // Both directions are joined before the tunnel releases its sockets.
    let (up, down) = tokio::join!(client_to_target, target_to_client);

    state = TunnelState::Closed;
    let stats = TunnelStats {
        client_to_target: up.unwrap_or(0),
        target_to_client: down.unwrap_or(0),
    };
    tracing::debug!(
        target = %target,
        state = ?state,
        client_to_target = stats.client_to_target,
        target_to_client = stats.target_to_client,
        "Tunnel closed"
    );
    Ok(stats)
}

/// Copy one direction until EOF or error, then shut down the write side to
/// unblock the opposite direction. Returns bytes moved.
async fn copy_direction<R, W>(
    read: &mut R,
    write: &mut W,
    idle_timeout: Option<Duration>,
    already_forwarded: u64,
) -> io::Result<u64>
where
    R: AsyncReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    let mut total = already_forwarded;
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let read_result = if let Some(timeout) = idle_timeout {
            match tokio::time::timeout(timeout, read.read(&mut buf)).await {
                Ok(result) => result,
                Err(_) => {
                    let _ = write.shutdown().await;
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "tunnel idle timeout"));
                }
            }
        } else {
            read.read(&mut buf).await
        };

        match read_result {
            Ok(0) => break,
            Ok(n) => {
                write.write_all(&buf[..n]).await?;
                total += n as u64;
            }
            Err(e) => {
                let _ = write.shutdown().await;
                return Err(e);
            }
        }
    }
    write.shutdown().await?;
    Ok(total)
}
