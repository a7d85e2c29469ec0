//! Pooled request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Control API send → request.rs (assemble raw request bytes, pure)
//!     → dispatcher.rs (round-robin slot per task, concurrent exchanges)
//!     → response.rs (framing-aware parse of exactly one response)
//!     → results collected in task index order
//! ```
//!
//! # Design Decisions
//! - The response reader is framed by Content-Length or chunked encoding,
//!   never by reading until the peer closes; pooled connections stay open
//!   between requests
//! - Concurrency is clamped to the pool size, and each slot is locked for
//!   the duration of its exchange, so one socket never carries two
//!   interleaved exchanges
//! - Sub-failures are aggregated, not dropped; every task runs to completion

pub mod dispatcher;
pub mod request;
pub mod response;

use std::time::Duration;
use thiserror::Error;

pub use dispatcher::{dispatch_concurrent, send_and_receive};
pub use request::PendingRequest;
pub use response::ExchangeResponse;

/// Bounds applied to a single exchange.
#[derive(Debug, Clone)]
pub struct ExchangeLimits {
    /// Total time budget for writing the request and reading the response.
    pub exchange_timeout: Duration,
    /// Maximum bytes for the response status line plus headers.
    pub max_head_bytes: usize,
    /// Maximum bytes for the response body.
    pub max_body_bytes: usize,
}

impl ExchangeLimits {
    pub fn from_config(config: &crate::config::ProxyConfig) -> Self {
        Self {
            exchange_timeout: Duration::from_secs(config.timeouts.exchange_secs),
            max_head_bytes: config.limits.max_head_bytes,
            max_body_bytes: config.limits.max_body_bytes,
        }
    }
}

impl Default for ExchangeLimits {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_secs(30),
            max_head_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Error type for dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Writing the raw request to the connection failed.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading response bytes from the connection failed.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The response was malformed or truncated.
    #[error("malformed response: {0}")]
    Parse(String),

    /// One or more concurrent sub-dispatches failed; every failure message
    /// is retained.
    #[error("{} of {} dispatches failed: {}", .failures.len(), .total, .failures.join("; "))]
    Aggregate { total: usize, failures: Vec<String> },
}
