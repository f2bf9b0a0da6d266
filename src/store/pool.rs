//! Bounded pool of backing-store connections.
//!
//! # Responsibilities
//! - Open `size` connections eagerly at startup
//! - Lend each connection to exactly one caller at a time
//! - Probe liveness before every lease and replace dead connections
//! - Bound the wait for a free connection
//! - Close everything on shutdown and refuse further leases
//!
//! # State Machine
//! ```text
//! Idle ──acquire──▶ Leased ──release──▶ Idle
//!   │                  │
//!   └──── close / failed probe ────▶ Closed   (a dead connection is replaced
//!                                              by a fresh Idle one)
//! ```
//!
//! # Design Decisions
//! - All state transitions happen under one `parking_lot::Mutex`; waiters
//!   park on a `Condvar` with a deadline
//! - Opening and probing run outside the lock so a slow store does not
//!   block releases
//! - A dead connection is replaced at most once per `acquire`; a failed
//!   replacement shrinks the pool and the slot is reopened lazily later

use std::collections::{HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use thiserror::Error;

use crate::observability::metrics;
use crate::store::{ManageConnection, StoreError};

/// Pool errors surfaced to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// `close()` was called.
    #[error("connection pool is closed")]
    Closed,

    /// No connection became available before the deadline.
    #[error("connection pool exhausted: no connection available within {0:?}")]
    Timeout(Duration),

    /// The leased connection was dead and opening a replacement failed.
    #[error("connection pool exhausted: replacing a dead connection failed: {0}")]
    Replacement(#[source] StoreError),

    /// Opening a connection failed.
    #[error("failed to open backing-store connection: {0}")]
    Connect(#[source] StoreError),
}

impl PoolError {
    /// True for the exhaustion class (timeout or failed replacement).
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PoolError::Timeout(_) | PoolError::Replacement(_))
    }
}

/// Pool sizing and wait bounds.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Number of connections opened at startup and the maximum held.
    pub size: usize,
    /// Longest `acquire()` will wait for an Idle connection.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle state of one pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Leased,
    Closed,
}

/// Point-in-time pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub size: usize,
    pub open: usize,
    pub idle: usize,
    pub leased: usize,
    pub closed: bool,
}

struct Slot<C> {
    id: u64,
    conn: C,
}

struct PoolState<C> {
    idle: VecDeque<Slot<C>>,
    leased: HashSet<u64>,
    /// Connections that exist or are being opened (idle + leased + in flight).
    open: usize,
    closed: bool,
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    state: Mutex<PoolState<M::Connection>>,
    available: Condvar,
    next_id: AtomicU64,
}

enum Lease<C> {
    Existing(Slot<C>),
    Fresh,
}

impl<M: ManageConnection> PoolInner<M> {
    fn open_slot(&self) -> Result<Slot<M::Connection>, StoreError> {
        let conn = self.manager.connect()?;
        Ok(Slot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            conn,
        })
    }

    /// Give up a reserved slot that never became a connection.
    fn forfeit_slot(&self) {
        let mut state = self.state.lock();
        state.open -= 1;
        drop(state);
        self.available.notify_one();
    }

    fn return_slot(&self, slot: Slot<M::Connection>) {
        let mut state = self.state.lock();
        state.leased.remove(&slot.id);
        if state.closed {
            state.open -= 1;
            drop(state);
            self.manager.close(slot.conn);
            return;
        }
        state.idle.push_back(slot);
        drop(state);
        self.available.notify_one();
    }
}

/// A bounded, liveness-checked connection pool.
pub struct ConnectionPool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageConnection> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Open `config.size` connections. Any failure closes what was opened
    /// and aborts.
    pub fn initialize(manager: M, config: PoolConfig) -> Result<Self, PoolError> {
        let inner = PoolInner {
            manager,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.size),
                leased: HashSet::new(),
                open: 0,
                closed: false,
            }),
            available: Condvar::new(),
            next_id: AtomicU64::new(1),
        };

        let mut opened = VecDeque::with_capacity(config.size);
        for index in 0..config.size {
            match inner.open_slot() {
                Ok(slot) => opened.push_back(slot),
                Err(e) => {
                    tracing::error!(index, error = %e, "Failed to open pooled connection");
                    for slot in opened {
                        inner.manager.close(slot.conn);
                    }
                    return Err(PoolError::Connect(e));
                }
            }
        }

        {
            let mut state = inner.state.lock();
            state.open = opened.len();
            state.idle = opened;
        }

        tracing::info!(
            size = config.size,
            acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
            "Connection pool initialized"
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Lease a connection, waiting at most the configured timeout.
    pub fn acquire(&self) -> Result<PooledConnection<M>, PoolError> {
        self.acquire_timeout(self.inner.config.acquire_timeout)
    }

    /// Lease a connection, waiting at most `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection<M>, PoolError> {
        let started = Instant::now();
        let deadline = started + timeout;

        let lease = {
            let mut state = self.inner.state.lock();
            loop {
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if let Some(slot) = state.idle.pop_front() {
                    break Lease::Existing(slot);
                }
                if state.open < self.inner.config.size {
                    state.open += 1;
                    break Lease::Fresh;
                }
                if Instant::now() >= deadline {
                    metrics::record_pool_timeout();
                    tracing::warn!(
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Timed out waiting for a pooled connection"
                    );
                    return Err(PoolError::Timeout(timeout));
                }
                self.inner.available.wait_until(&mut state, deadline);
            }
        };

        let slot = match lease {
            Lease::Existing(mut slot) => {
                if self.inner.manager.is_valid(&mut slot.conn) {
                    slot
                } else {
                    tracing::warn!(connection = slot.id, "Pooled connection failed liveness probe, replacing");
                    metrics::record_pool_replacement();
                    self.inner.manager.close(slot.conn);
                    match self.inner.open_slot() {
                        Ok(fresh) => fresh,
                        Err(e) => {
                            self.inner.forfeit_slot();
                            return Err(PoolError::Replacement(e));
                        }
                    }
                }
            }
            Lease::Fresh => match self.inner.open_slot() {
                Ok(fresh) => fresh,
                Err(e) => {
                    self.inner.forfeit_slot();
                    return Err(PoolError::Connect(e));
                }
            },
        };

        let mut state = self.inner.state.lock();
        if state.closed {
            state.open -= 1;
            drop(state);
            self.inner.manager.close(slot.conn);
            return Err(PoolError::Closed);
        }
        state.leased.insert(slot.id);
        drop(state);

        tracing::trace!(connection = slot.id, "Connection leased");
        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            slot: Some(slot),
        })
    }

    /// Return a lease. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    /// Close every idle connection now and every leased one on return.
    /// Blocked and future `acquire()` calls fail with [`PoolError::Closed`].
    pub fn close(&self) {
        let drained: Vec<_> = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.open -= drained.len();
            drained
        };
        self.inner.available.notify_all();

        let count = drained.len();
        for slot in drained {
            self.inner.manager.close(slot.conn);
        }
        tracing::info!(closed_idle = count, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            size: self.inner.config.size,
            open: state.open,
            idle: state.idle.len(),
            leased: state.leased.len(),
            closed: state.closed,
        }
    }

    /// State of the connection with `id`, as far as the pool knows.
    pub fn connection_state(&self, id: u64) -> ConnectionState {
        let state = self.inner.state.lock();
        if state.leased.contains(&id) {
            ConnectionState::Leased
        } else if state.idle.iter().any(|slot| slot.id == id) {
            ConnectionState::Idle
        } else {
            ConnectionState::Closed
        }
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

/// An exclusive lease on a pooled connection. Returned to the pool on drop.
pub struct PooledConnection<M: ManageConnection> {
    pool: Arc<PoolInner<M>>,
    slot: Option<Slot<M::Connection>>,
}

impl<M: ManageConnection> PooledConnection<M> {
    /// Pool-assigned identifier of the underlying connection.
    pub fn id(&self) -> u64 {
        self.slot.as_ref().map(|s| s.id).unwrap_or_default()
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.slot {
            Some(slot) => &slot.conn,
            None => unreachable!("slot is only taken in drop"),
        }
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.slot {
            Some(slot) => &mut slot.conn,
            None => unreachable!("slot is only taken in drop"),
        }
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::trace!(connection = slot.id, "Connection released");
            self.pool.return_slot(slot);
        }
    }
}

impl<M: ManageConnection> std::fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").field("id", &self.id()).finish()
    }
}
