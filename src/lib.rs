//! Forwarding proxy core with per-host connection pooling.
//!
//! Two inbound surfaces share one process: a proxy listener that tunnels
//! CONNECT requests and relays everything else, and a JSON control API that
//! opens per-host pools of long-lived outbound connections and dispatches
//! synthetic requests across them concurrently.

// Core subsystems
pub mod config;
pub mod net;
pub mod server;

// Outbound machinery
pub mod dispatch;
pub mod pool;
pub mod relay;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use pool::PoolRegistry;
pub use server::{ControlState, ProxyServer};
