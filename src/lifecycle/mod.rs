//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Initialize subsystems → Start listeners
//!
//! Shutdown:
//!     SIGINT/SIGTERM → broadcast signal → listeners stop accepting
//!     → pools torn down → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
