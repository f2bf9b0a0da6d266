//! Backing-store access subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → pool.rs (acquire: wait for Idle, probe liveness, lease)
//!     → ManageConnection (open / probe / close the real handle)
//!     → PooledConnection guard (released to Idle on drop)
//! ```
//!
//! # Design Decisions
//! - The pool is constructed explicitly at startup and injected into
//!   handlers; there is no global instance
//! - Store drivers plug in through [`ManageConnection`]
//! - A lease is an owned guard, so one connection can never be held by two
//!   callers at once

pub mod memory;
pub mod pool;

use thiserror::Error;

pub use memory::{MemoryConnection, MemoryStore};
pub use pool::{ConnectionPool, ConnectionState, PoolConfig, PoolError, PoolStatus, PooledConnection};

/// Errors raised by a backing-store driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Opening a connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A query or command failed on an open connection.
    #[error("query failed: {0}")]
    Query(String),

    /// The connection is no longer usable.
    #[error("connection lost")]
    ConnectionLost,
}

/// Opens, probes and closes connections for a [`ConnectionPool`].
pub trait ManageConnection: Send + Sync + 'static {
    /// The handle lent to callers.
    type Connection: Send + 'static;

    /// Open a new connection.
    fn connect(&self) -> Result<Self::Connection, StoreError>;

    /// Cheap round-trip used before every lease.
    fn is_valid(&self, conn: &mut Self::Connection) -> bool;

    /// Release the underlying resources.
    fn close(&self, conn: Self::Connection) {
        drop(conn);
    }
}
