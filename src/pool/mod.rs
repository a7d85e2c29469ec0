//! Outbound connection pooling subsystem.
//!
//! # Data Flow
//! ```text
//! Control API open → registry.rs (dial count connections, install pool)
//!     → host_pool.rs (ordered slots + rotation cursor)
//!     → connection.rs (one exclusively-owned TCP stream per slot)
//!
//! Dispatch → registry.rs (look up pool by host)
//!     → host_pool.rs select_next (atomic cursor advance)
//!     → slot handed to exactly one in-flight exchange
//! ```
//!
//! # Design Decisions
//! - A pool is immutable after construction; replacement installs a new one
//! - The rotation cursor is the only shared mutable state; its lock window
//!   is a single atomic fetch-add, never I/O
//! - Selection never closes a connection; keep-alive reuse is intentional

pub mod connection;
pub mod host_pool;
pub mod registry;

pub use connection::{ConnectionId, ConnectionState, PooledConnection};
pub use host_pool::HostPool;
pub use registry::{PoolError, PoolRegistry};
