//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy listener configuration (CONNECT tunneling + HTTP relay).
    pub proxy: ListenerConfig,

    /// Control API configuration (pool open / pooled dispatch).
    pub control: ControlConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// HTTP relay behavior.
    pub relay: RelayConfig,

    /// Size limits for parsed request/response data.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Proxy listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent inbound connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Control API listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address for the JSON control API.
    pub bind_address: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8088".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds (pool dials and
    /// tunnel dials alike).
    pub connect_secs: u64,

    /// Total time budget for one pooled exchange (write request, read
    /// response) in seconds.
    pub exchange_secs: u64,

    /// Request timeout for the HTTP relay and the control API in seconds.
    pub request_secs: u64,

    /// Idle timeout for established tunnels in seconds; 0 disables it.
    pub tunnel_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            exchange_secs: 30,
            request_secs: 60,
            tunnel_idle_secs: 300,
        }
    }
}

/// HTTP relay behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Decode gzip response bodies for inspection and strip the
    /// Content-Encoding header from what is sent onward.
    pub decode_gzip: bool,

    /// Maximum compressed body size the relay will materialize when
    /// decoding. Larger bodies fail the relay with 502.
    pub max_decode_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            decode_gzip: true,
            max_decode_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Size limits for parsed request and response data.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bytes for a request or response head (request line /
    /// status line plus headers).
    pub max_head_bytes: usize,

    /// Maximum bytes for a parsed response body.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
