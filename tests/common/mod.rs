//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_server::api;
use parking_server::config::AppConfig;
use parking_server::http::middleware::StaticTokenStore;
use parking_server::http::{HttpServer, Request, Response, ServerSettings};
use parking_server::lifecycle::Shutdown;
use parking_server::net::Listener;
use parking_server::routing::{HandlerError, HandlerResult};
use parking_server::store::{ConnectionPool, MemoryStore, PoolConfig};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const TOKEN: &str = "test-token-123";

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub store: MemoryStore,
    /// Number of times the `/api/echo` handler ran.
    pub echo_calls: Arc<AtomicUsize>,
    pub handle: JoinHandle<()>,
}

impl TestServer {
    pub fn echo_calls(&self) -> usize {
        self.echo_calls.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the accept loop to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

/// Start a server with default settings.
pub async fn start_server() -> TestServer {
    start_server_with(|_, _| {}).await
}

/// Start a server after letting `tweak` adjust config and connection settings.
///
/// Routes: the system routes, plus `GET|POST /api/echo` (public) which
/// replies with the `n` query parameter and the body length, and
/// `GET /api/fail` which returns an internal error.
pub async fn start_server_with<F>(tweak: F) -> TestServer
where
    F: FnOnce(&mut AppConfig, &mut ServerSettings),
{
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.public_paths.push("/api/echo".to_string());
    let mut settings = ServerSettings {
        idle_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_secs(1),
        ..ServerSettings::default()
    };
    tweak(&mut config, &mut settings);

    let store = MemoryStore::new();
    let pool = ConnectionPool::initialize(
        store.clone(),
        PoolConfig {
            size: 2,
            acquire_timeout: Duration::from_millis(200),
        },
    )
    .unwrap();
    let tokens = Arc::new(StaticTokenStore::new(config.auth.tokens.clone()));

    let echo_calls = Arc::new(AtomicUsize::new(0));
    let mut builder = api::base_builder(&config, tokens);
    api::register_system_routes(&mut builder, pool).unwrap();

    let calls = echo_calls.clone();
    let echo = move |req: &mut Request, resp: &mut Response| -> HandlerResult {
        calls.fetch_add(1, Ordering::SeqCst);
        resp.ok(json!({
            "n": req.query("n"),
            "len": req.body.len(),
            "json": req.json_body,
        }));
        Ok(())
    };
    builder
        .get("/api/echo", vec![], echo.clone())
        .unwrap()
        .post("/api/echo", vec![], echo)
        .unwrap()
        .get("/api/fail", vec![], |_req, _resp| {
            Err(HandlerError::Internal("simulated".into()))
        })
        .unwrap();
    api::register_info_route(&mut builder).unwrap();
    let router = Arc::new(builder.build());

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::with_settings(settings, router);
    let run_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, run_shutdown).await.unwrap();
    });

    TestServer {
        addr,
        shutdown,
        store,
        echo_calls,
        handle,
    }
}

/// One parsed HTTP response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Parse one complete response from the front of `buf`, if present.
fn parse_one(buf: &mut Vec<u8>) -> Option<RawResponse> {
    let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n")?;
    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let status = head.split_whitespace().nth(1)?.parse().ok()?;
    let length: usize = head
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let total = head_end + 4 + length;
    if buf.len() < total {
        return None;
    }
    let body = buf[head_end + 4..total].to_vec();
    buf.drain(..total);
    Some(RawResponse { status, head, body })
}

/// Read exactly `n` responses from `stream`.
pub async fn read_responses(stream: &mut TcpStream, n: usize) -> Vec<RawResponse> {
    let mut buf = Vec::new();
    let mut responses = Vec::new();
    let mut chunk = [0u8; 4096];

    while responses.len() < n {
        while let Some(response) = parse_one(&mut buf) {
            responses.push(response);
        }
        if responses.len() >= n {
            break;
        }
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut chunk))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        assert!(read > 0, "connection closed after {} responses", responses.len());
        buf.extend_from_slice(&chunk[..read]);
    }
    responses
}

/// True if nothing arrives on `stream` within `wait`.
pub async fn stays_silent(stream: &mut TcpStream, wait: Duration) -> bool {
    let mut chunk = [0u8; 64];
    tokio::time::timeout(wait, stream.read(&mut chunk)).await.is_err()
}

/// Connect, send `bytes`, and read `n` responses.
pub async fn exchange(addr: SocketAddr, bytes: &[u8], n: usize) -> Vec<RawResponse> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(bytes).await.unwrap();
    read_responses(&mut stream, n).await
}
