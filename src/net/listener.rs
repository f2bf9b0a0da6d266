//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured address with an explicit listen backlog
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//!
//! # Design Decisions
//! - The kernel backlog bounds connections not yet accepted
//! - Once accepted, a connection either gets a permit immediately or is
//!   handed back unadmitted so the caller can refuse it; nothing queues
//!   without bound

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid bind address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// A bounded TCP listener that limits concurrent connections.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr =
            config
                .bind_address
                .parse()
                .map_err(|source| ListenerError::Address {
                    address: config.bind_address.clone(),
                    source,
                })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ListenerError::Bind)?;
        socket.set_reuseaddr(true).map_err(ListenerError::Bind)?;
        socket.bind(addr).map_err(ListenerError::Bind)?;
        let listener = socket.listen(config.backlog).map_err(ListenerError::Bind)?;

        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            backlog = config.backlog,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept the next connection.
    ///
    /// The permit is `None` when `max_connections` connections are already
    /// active; the caller is expected to refuse and close the stream.
    pub async fn accept(
        &self,
    ) -> Result<(TcpStream, SocketAddr, Option<ConnectionPermit>), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        let permit = Arc::clone(&self.connection_limit)
            .try_acquire_owned()
            .ok()
            .map(|permit| ConnectionPermit { _permit: permit });

        tracing::debug!(
            peer_addr = %addr,
            admitted = permit.is_some(),
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, permit))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released. This keeps the limit
/// accurate even if the connection task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
