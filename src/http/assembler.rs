//! Response serialization to wire bytes.
//!
//! Output layout:
//! ```text
//! HTTP/1.1 <code> <reason>\r\n
//! <name>: <value>\r\n          (every header except Content-Length)
//! Content-Length: <body len>\r\n
//! \r\n
//! <body>
//! ```

use bytes::{BufMut, BytesMut};
use http::header::CONTENT_LENGTH;
use http::StatusCode;

use crate::http::response::Response;

/// Reason phrase for codes without a canonical one.
const GENERIC_REASON: &str = "Unknown Status";

/// Reason phrase for a numeric status code.
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or(GENERIC_REASON)
}

/// Serialize `response` onto the end of `dst`.
pub fn encode(response: &Response, dst: &mut BytesMut) {
    let status_line = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason_phrase(response.status)
    );
    dst.reserve(status_line.len() + 64 * response.headers.len() + response.body.len() + 32);
    dst.put_slice(status_line.as_bytes());

    for (name, value) in response.headers.iter() {
        if name == CONTENT_LENGTH {
            continue;
        }
        dst.put_slice(name.as_str().as_bytes());
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }

    dst.put_slice(format!("Content-Length: {}\r\n\r\n", response.body.len()).as_bytes());
    dst.put_slice(&response.body);
}

/// Serialize `response` into a fresh buffer.
pub fn to_bytes(response: &Response) -> BytesMut {
    let mut dst = BytesMut::new();
    encode(response, &mut dst);
    dst
}
