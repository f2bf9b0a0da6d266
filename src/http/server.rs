//! HTTP server: accept loop and per-connection request pipeline.
//!
//! # Responsibilities
//! - Accept connections, refusing those over the connection limit
//! - Drive each connection: read → frame → dispatch → assemble → write
//! - Answer framing errors without corrupting pipelined requests
//! - Close idle connections and drain live ones on shutdown
//!
//! # Design Decisions
//! - One task per connection; within a connection every stage runs in
//!   order, so pipelined requests are answered in arrival order
//! - Dispatch runs on the blocking pool because handlers may block on the
//!   connection pool; a failed join is answered with a 500
//! - A request already dispatched is never cancelled; shutdown only
//!   interrupts a connection while it waits for bytes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use http::header::CONNECTION;
use http::HeaderValue;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::AppConfig;
use crate::http::assembler;
use crate::http::framer::{Frame, FrameError, FramerLimits, RequestFramer};
use crate::http::request::Request;
use crate::http::response::{codes, Response};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionGuard, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::Router;

/// Per-connection runtime settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Close a connection after this long without new bytes.
    pub idle_timeout: Duration,
    /// How long `run` waits for connections to finish after shutdown.
    pub shutdown_grace: Duration,
    pub limits: FramerLimits,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(10),
            limits: FramerLimits::default(),
        }
    }
}

impl From<&AppConfig> for ServerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            idle_timeout: config.timeouts.idle(),
            shutdown_grace: config.timeouts.shutdown_grace(),
            limits: FramerLimits {
                max_header_bytes: config.limits.max_header_bytes,
                max_body_bytes: config.limits.max_body_bytes,
            },
        }
    }
}

/// The HTTP/1.1 server.
pub struct HttpServer {
    router: Arc<Router>,
    settings: ServerSettings,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a server for `router` using the configured timeouts and limits.
    pub fn new(config: &AppConfig, router: Arc<Router>) -> Self {
        Self::with_settings(ServerSettings::from(config), router)
    }

    pub fn with_settings(settings: ServerSettings, router: Arc<Router>) -> Self {
        Self {
            router,
            settings,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Live connection tracker, shared with every connection task.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(address = %addr, routes = self.router.len(), "HTTP server starting");

        let mut shutdown_rx = shutdown.subscribe();
        while !shutdown.is_triggered() {
            let accepted = tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer_addr, Some(permit))) => {
                    let connection = Connection {
                        router: Arc::clone(&self.router),
                        settings: self.settings.clone(),
                        shutdown: shutdown.clone(),
                        guard: self.tracker.track(),
                        peer_addr,
                    };
                    tokio::spawn(async move {
                        let _permit = permit;
                        connection.serve(stream).await;
                    });
                }
                Ok((stream, peer_addr, None)) => {
                    metrics::record_rejected_connection();
                    tracing::warn!(
                        peer_addr = %peer_addr,
                        max_connections = listener.max_connections(),
                        "Connection limit reached, rejecting"
                    );
                    let response = self.router.new_response();
                    tokio::spawn(reject(stream, response));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }

        drop(listener);
        let active = self.tracker.active_count();
        tracing::info!(active_connections = active, "Listener closed, draining connections");
        if !self.tracker.wait_for_drain(self.settings.shutdown_grace).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline passed with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Answer an over-limit connection with 503 and close it.
async fn reject(mut stream: TcpStream, mut response: Response) {
    response.error(503, codes::SERVICE_UNAVAILABLE, "Too many connections");
    response
        .headers
        .insert(CONNECTION, HeaderValue::from_static("close"));
    let bytes = assembler::to_bytes(&response);
    if let Err(e) = stream.write_all(&bytes).await {
        tracing::debug!(error = %e, "Failed to write rejection");
    }
    let _ = stream.shutdown().await;
}

/// Why a connection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    PeerClosed,
    ClientRequested,
    IdleTimeout,
    FramingError,
    Shutdown,
}

/// State owned by one connection task.
struct Connection {
    router: Arc<Router>,
    settings: ServerSettings,
    shutdown: Shutdown,
    guard: ConnectionGuard,
    peer_addr: SocketAddr,
}

impl Connection {
    async fn serve(self, mut stream: TcpStream) {
        let connection_id = self.guard.id();
        tracing::debug!(connection_id = %connection_id, peer_addr = %self.peer_addr, "Connection opened");

        match self.process(&mut stream).await {
            Ok(reason) => {
                tracing::debug!(connection_id = %connection_id, reason = ?reason, "Connection finished");
            }
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Connection I/O error");
            }
        }
        let _ = stream.shutdown().await;
    }

    async fn process(&self, stream: &mut TcpStream) -> std::io::Result<CloseReason> {
        let mut framer = RequestFramer::new(self.settings.limits);
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut out = BytesMut::with_capacity(4 * 1024);

        loop {
            loop {
                match framer.try_extract_one() {
                    Frame::Incomplete => break,
                    Frame::Request(request) => {
                        let close = request.wants_close();
                        let mut response = self.dispatch(request).await;
                        if close {
                            response
                                .headers
                                .insert(CONNECTION, HeaderValue::from_static("close"));
                        }
                        self.write(stream, &mut out, &response).await?;
                        if close {
                            return Ok(CloseReason::ClientRequested);
                        }
                    }
                    Frame::Rejected(error) => {
                        let response = self.framing_error(&error);
                        self.write(stream, &mut out, &response).await?;
                        if !error.is_recoverable() {
                            return Ok(CloseReason::FramingError);
                        }
                    }
                }
            }

            if self.shutdown.is_triggered() {
                return Ok(CloseReason::Shutdown);
            }

            let read = tokio::select! {
                read = tokio::time::timeout(
                    self.settings.idle_timeout,
                    stream.read_buf(framer.buffer_mut().as_read_target()),
                ) => read,
                _ = shutdown_rx.recv() => return Ok(CloseReason::Shutdown),
            };

            match read {
                Err(_elapsed) => return Ok(CloseReason::IdleTimeout),
                Ok(Ok(0)) => return Ok(CloseReason::PeerClosed),
                Ok(Ok(n)) => {
                    tracing::trace!(
                        connection_id = %self.guard.id(),
                        bytes = n,
                        buffered = framer.buffered(),
                        "Read"
                    );
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Route `request` on the blocking pool.
    async fn dispatch(&self, request: Request) -> Response {
        let start_time = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();

        let router = Arc::clone(&self.router);
        let response = match tokio::task::spawn_blocking(move || router.dispatch(request)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(method = %method, path = %path, error = %e, "Dispatch task failed");
                let mut response = self.router.new_response();
                response.server_error("Internal server error");
                response
            }
        };

        metrics::record_request(method.as_str(), response.status, start_time);
        tracing::debug!(
            connection_id = %self.guard.id(),
            method = %method,
            path = %path,
            status = response.status,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    fn framing_error(&self, error: &FrameError) -> Response {
        let status = error.status();
        tracing::debug!(
            connection_id = %self.guard.id(),
            peer_addr = %self.peer_addr,
            status,
            error = %error,
            "Framing error"
        );

        let code = if status < 500 {
            codes::BAD_REQUEST
        } else {
            codes::SERVER_ERROR
        };
        let mut response = self.router.new_response();
        response.error(status, code, error.to_string());
        if !error.is_recoverable() {
            response
                .headers
                .insert(CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }

    async fn write(
        &self,
        stream: &mut TcpStream,
        out: &mut BytesMut,
        response: &Response,
    ) -> std::io::Result<()> {
        out.clear();
        assembler::encode(response, out);
        stream.write_all(out).await
    }
}
