//! Relay subsystem: CONNECT tunneling and plain HTTP forwarding.
//!
//! # Data Flow
//! ```text
//! Proxy listener classifies the request line:
//!     CONNECT host:port → tunnel.rs (dial, ack, duplex byte splice)
//!     anything else     → http.rs (clone request, forward, stream back)
//! ```
//!
//! # Design Decisions
//! - A tunnel failure is terminal for that tunnel only; other tunnels and
//!   relays are unaffected
//! - Tunnel cancellation is implicit: each direction shuts down its write
//!   side on EOF, which unblocks the opposite direction
//! - The HTTP relay copies headers additively so repeated headers survive

pub mod http;
pub mod tunnel;

pub use http::{RelayClient, RelaySettings};
pub use tunnel::{TunnelError, TunnelState, TunnelStats};
