//! Framed HTTP request.
//!
//! # Responsibilities
//! - Carry everything the framer extracted from one request unit
//! - Hold path parameters bound by the router after a match
//! - Provide a free-form context map for middleware-to-handler data
//!
//! # Design Decisions
//! - Header lookups are case-insensitive (`http::HeaderMap`)
//! - Query strings are decoded once, at framing time
//! - After handoff to the router only `path_params`, `context` and
//!   `json_body` are written

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};

/// A single HTTP request unit.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method (extension methods are kept verbatim).
    pub method: Method,
    /// Path component of the request target, without the query string.
    pub path: String,
    /// HTTP version token from the request line (e.g. `HTTP/1.1`).
    pub version: String,
    /// Decoded query parameters. The last occurrence of a key wins.
    pub query: HashMap<String, String>,
    /// Path parameters, populated by the router on match.
    pub path_params: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw body bytes (exactly `Content-Length` bytes).
    pub body: Bytes,
    /// Parsed JSON object body, set by the JSON body middleware.
    pub json_body: Option<Map<String, Value>>,
    /// Values passed from middleware to handlers.
    pub context: HashMap<String, Value>,
}

impl Request {
    /// Build a request from a method and a raw target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            version: "HTTP/1.1".to_string(),
            query,
            path_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            json_body: None,
            context: HashMap::new(),
        }
    }

    /// Header value as a string, if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.context.insert(key.into(), value.into());
    }

    /// True if the client asked for the connection to be closed after this request.
    pub fn wants_close(&self) -> bool {
        self.header("connection")
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("close")))
            .unwrap_or(false)
    }
}

/// Split a request target into its path and decoded query parameters.
pub fn split_target(target: &str) -> (String, HashMap<String, String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (target.to_string(), HashMap::new()),
    }
}

/// Decode an `application/x-www-form-urlencoded` query string.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn target_is_split_and_decoded() {
        let req = Request::new(Method::GET, "/api/cars?type=%E5%B0%8F&page=2&page=3");
        assert_eq!(req.path, "/api/cars");
        assert_eq!(req.query("type"), Some("小"));
        assert_eq!(req.query("page"), Some("3"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut req = Request::new(Method::GET, "/");
        req.headers
            .insert("content-type", HeaderValue::from_static("application/json"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn connection_close_detection() {
        let mut req = Request::new(Method::GET, "/");
        assert!(!req.wants_close());
        req.headers
            .insert("connection", HeaderValue::from_static("keep-alive, Close"));
        assert!(req.wants_close());
    }

    #[test]
    fn context_round_trip() {
        let mut req = Request::new(Method::GET, "/");
        req.set_context("authenticated", true);
        assert_eq!(req.context("authenticated"), Some(&Value::Bool(true)));
        assert!(req.context("missing").is_none());
    }
}
