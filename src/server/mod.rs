//! Inbound server surfaces.
//!
//! # Data Flow
//! ```text
//! Proxy listener (proxy.rs)
//!     → head sniff → CONNECT → relay::tunnel
//!                  → other   → hyper HTTP/1.1 driver → relay::http
//!
//! Control API (control.rs, axum)
//!     POST /connect → pool::registry open
//!     POST /send    → dispatch::dispatch_concurrent
//!     GET  /status  → registry snapshot
//! ```

pub mod control;
pub mod proxy;
pub mod target;

pub use control::{router, ControlState};
pub use proxy::ProxyServer;
pub use target::{parse_target, Target, TargetError};
