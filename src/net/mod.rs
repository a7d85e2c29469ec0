//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → server::proxy (head sniff, CONNECT vs relay classification)
//!     → rewind.rs (replay sniffed bytes for the HTTP/1.1 driver)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Sniffed head bytes are never lost; they are either consumed by the
//!   tunnel path or replayed to the protocol driver

pub mod listener;
pub mod rewind;

pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use rewind::Rewind;
