//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id assignment, lifecycle tracking)
//!     → buffer.rs (per-connection byte accumulator)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - A buffer belongs to exactly one connection task

pub mod buffer;
pub mod connection;
pub mod listener;

pub use buffer::ConnectionBuffer;
pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
