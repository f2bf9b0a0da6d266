//! Response object and the JSON envelope used by every handler.
//!
//! # Responsibilities
//! - Hold status, headers and body while middleware/handlers mutate them
//! - Build the `{"code", "msg", "data"?}` envelope for common outcomes
//!
//! # Design Decisions
//! - `Content-Length` is never trusted from here; the assembler computes it
//! - Every response starts with `Content-Type: application/json` and a
//!   `Server` header

use bytes::Bytes;
use http::header::{CONTENT_TYPE, SERVER};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;

/// Default `Server` header value.
pub const DEFAULT_SERVER_NAME: &str = "ParkingServer/1.0";

/// Envelope codes carried in the `code` field.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERIC_ERROR: i32 = 1001;
    pub const BAD_REQUEST: i32 = 4001;
    pub const INVALID_PARAMETER: i32 = 4002;
    pub const UNAUTHORIZED: i32 = 4011;
    pub const ROUTE_NOT_FOUND: i32 = 4041;
    pub const RESOURCE_NOT_FOUND: i32 = 4042;
    pub const SERVER_ERROR: i32 = 5001;
    pub const OPERATION_FAILED: i32 = 5002;
    /// Capacity exhausted: backing-store pool or connection limit.
    pub const SERVICE_UNAVAILABLE: i32 = 5003;
}

/// The uniform JSON response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiEnvelope {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiEnvelope {
    pub fn new(code: i32, msg: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data,
        }
    }
}

/// An HTTP response under construction.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// A 200 response with the default headers and an empty body.
    pub fn new() -> Self {
        Self::with_server_name(DEFAULT_SERVER_NAME)
    }

    /// A 200 response advertising `server_name` in the `Server` header.
    pub fn with_server_name(server_name: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let server = HeaderValue::from_str(server_name)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_SERVER_NAME));
        headers.insert(SERVER, server);
        Self {
            status: 200,
            headers,
            body: Bytes::new(),
        }
    }

    /// 200 with `data` wrapped in a success envelope.
    pub fn ok(&mut self, data: impl Into<Value>) {
        self.status = 200;
        self.envelope(ApiEnvelope::new(codes::SUCCESS, "success", Some(data.into())));
    }

    /// 200 with any serializable `data` wrapped in a success envelope.
    pub fn json_ok<T: Serialize + ?Sized>(&mut self, data: &T) {
        match serde_json::to_value(data) {
            Ok(value) => self.ok(value),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response data");
                self.server_error("Failed to serialize response");
            }
        }
    }

    /// 200 with a success envelope carrying only a message.
    pub fn ok_message(&mut self, msg: impl Into<String>) {
        self.status = 200;
        self.envelope(ApiEnvelope::new(codes::SUCCESS, msg, None));
    }

    pub fn bad_request(&mut self, msg: impl Into<String>) {
        self.error(400, codes::BAD_REQUEST, msg);
    }

    pub fn unauthorized(&mut self, msg: impl Into<String>) {
        self.error(401, codes::UNAUTHORIZED, msg);
    }

    /// 404 for requests no route matched.
    pub fn not_found(&mut self, msg: impl Into<String>) {
        self.error(404, codes::ROUTE_NOT_FOUND, msg);
    }

    pub fn server_error(&mut self, msg: impl Into<String>) {
        self.error(500, codes::SERVER_ERROR, msg);
    }

    /// Set the status and an error envelope in one step.
    pub fn error(&mut self, status: u16, code: i32, msg: impl Into<String>) {
        self.status = status;
        self.envelope(ApiEnvelope::new(code, msg, None));
    }

    pub fn envelope(&mut self, envelope: ApiEnvelope) {
        self.json(&envelope);
    }

    /// Serialize `value` as the compact JSON body.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = match serde_json::to_vec(value) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                self.status = 500;
                Bytes::from_static(br#"{"code":5001,"msg":"Failed to serialize response"}"#)
            }
        };
    }

    pub fn text(&mut self, text: impl Into<String>) {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Bytes::from(text.into());
    }

    pub fn html(&mut self, html: impl Into<String>) {
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        self.body = Bytes::from(html.into());
    }

    /// Set a header, replacing any previous value. Invalid names or values are ignored.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid response header"),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The body parsed back as JSON. Mostly useful in tests and logging.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let resp = Response::new();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("application/json"));
        assert_eq!(resp.header("server"), Some(DEFAULT_SERVER_NAME));
        assert!(resp.body.is_empty());
    }

    #[test]
    fn ok_wraps_data() {
        let mut resp = Response::new();
        resp.ok(json!({"status": "healthy"}));
        assert_eq!(
            resp.body_json(),
            Some(json!({"code": 0, "msg": "success", "data": {"status": "healthy"}}))
        );
    }

    #[test]
    fn error_envelopes_omit_data() {
        let mut resp = Response::new();
        resp.not_found("Route not found");
        assert_eq!(resp.status, 404);
        assert_eq!(
            resp.body_json(),
            Some(json!({"code": 4041, "msg": "Route not found"}))
        );

        resp.unauthorized("nope");
        assert_eq!(resp.status, 401);
        assert_eq!(resp.body_json().unwrap()["code"], 4011);
    }

    #[test]
    fn text_sets_content_type() {
        let mut resp = Response::new();
        resp.text("hello");
        assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(&resp.body[..], b"hello");
    }
}
