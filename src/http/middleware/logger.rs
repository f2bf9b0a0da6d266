//! Request logging middleware.
//!
//! # Responsibilities
//! - Format one access line per request and hand it to a [`LogSink`]
//! - Assign a request ID (reusing an incoming `X-Request-ID`) and echo it
//! - Record the request start time in the context
//!
//! # Design Decisions
//! - The sink is an injected collaborator; formatting happens here, output
//!   policy (stdout, file, rotation) belongs to the sink

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::http::middleware::{Flow, Middleware};
use crate::http::request::Request;
use crate::http::response::Response;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Receives pre-formatted access log lines.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Forwards lines to `tracing` at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, line: &str) {
        tracing::info!(target: "parking_server::access", "{line}");
    }
}

/// Logs every request that reaches it and tags it with an ID.
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
}

impl RequestLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    fn format_line(timestamp_ms: u128, request_id: &str, req: &Request) -> String {
        format!("[{timestamp_ms}] {} {} ({request_id})", req.method, req.path)
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl Middleware for RequestLogger {
    fn handle(&self, req: &mut Request, resp: &mut Response) -> Flow {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let request_id = req
            .header(X_REQUEST_ID)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.sink
            .write_line(&Self::format_line(now_ms, &request_id, req));

        resp.set_header(X_REQUEST_ID, &request_id);
        req.set_context("request_id", request_id);
        req.set_context("request_start_ms", now_ms as u64);
        Flow::Continue
    }
}
