//! JSON request body parsing.

use serde_json::Value;

use crate::http::middleware::{Flow, Middleware};
use crate::http::request::Request;
use crate::http::response::Response;

/// Parses `application/json` bodies into [`Request::json_body`].
///
/// Requests with another content type, or with an empty body, pass
/// through untouched. Invalid JSON and non-object documents halt with 400.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBody;

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("application/json")
}

impl Middleware for JsonBody {
    fn handle(&self, req: &mut Request, resp: &mut Response) -> Flow {
        let is_json = req.header("content-type").is_some_and(is_json_content_type);
        if !is_json || req.body.is_empty() {
            return Flow::Continue;
        }

        match serde_json::from_slice::<Value>(&req.body) {
            Ok(Value::Object(map)) => {
                req.json_body = Some(map);
                Flow::Continue
            }
            Ok(_) => {
                resp.bad_request("JSON must be an object");
                Flow::Halt
            }
            Err(e) => {
                tracing::debug!(path = %req.path, error = %e, "Rejected malformed JSON body");
                resp.bad_request("Invalid JSON format");
                Flow::Halt
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderValue, Method};

    fn request(content_type: &'static str, body: &'static [u8]) -> Request {
        let mut req = Request::new(Method::POST, "/api/cars");
        req.headers
            .insert("content-type", HeaderValue::from_static(content_type));
        req.body = Bytes::from_static(body);
        req
    }

    #[test]
    fn parses_objects() {
        let mut req = request("application/json; charset=utf-8", br#"{"plate":"ABC123"}"#);
        let mut resp = Response::new();
        assert_eq!(JsonBody.handle(&mut req, &mut resp), Flow::Continue);
        let body = req.json_body.unwrap();
        assert_eq!(body["plate"], "ABC123");
    }

    #[test]
    fn ignores_other_content_types_and_empty_bodies() {
        let mut req = request("text/plain", b"not json");
        let mut resp = Response::new();
        assert_eq!(JsonBody.handle(&mut req, &mut resp), Flow::Continue);
        assert!(req.json_body.is_none());

        let mut req = request("application/json", b"");
        assert_eq!(JsonBody.handle(&mut req, &mut resp), Flow::Continue);
    }

    #[test]
    fn rejects_invalid_and_non_object() {
        let mut req = request("application/json", b"{oops");
        let mut resp = Response::new();
        assert_eq!(JsonBody.handle(&mut req, &mut resp), Flow::Halt);
        assert_eq!(resp.status, 400);
        assert_eq!(resp.body_json().unwrap()["msg"], "Invalid JSON format");

        let mut req = request("Application/JSON", b"[1,2]");
        let mut resp = Response::new();
        assert_eq!(JsonBody.handle(&mut req, &mut resp), Flow::Halt);
        assert_eq!(resp.body_json().unwrap()["msg"], "JSON must be an object");
    }
}
