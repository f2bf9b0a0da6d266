//! Incremental HTTP/1.1 request framing.
//!
//! # Responsibilities
//! - Accumulate arbitrarily chunked reads for one connection
//! - Extract complete request units (head + `Content-Length` body)
//! - Leave trailing pipelined bytes in place for the next extraction
//! - Turn a malformed request line into a recoverable error unit
//!
//! # Design Decisions
//! - Incomplete input never mutates the buffer, so extraction is
//!   independent of how the bytes were split across reads
//! - A malformed request line rejects its whole head (request line plus
//!   header lines up to the blank line) as one unit; blank lines before a
//!   request line are skipped, so the stream resynchronises on the next
//!   well-formed request
//! - Errors that make the byte stream unrecoverable (oversized head, bad
//!   or oversized `Content-Length`, chunked bodies) are fatal and the
//!   connection is closed after the error response
//!
//! # Usage
//! ```text
//! on read(bytes):
//!     framer.append(bytes)
//!     loop {
//!         match framer.try_extract_one() {
//!             Frame::Incomplete => break,
//!             Frame::Request(req) => dispatch(req),
//!             Frame::Rejected(err) => respond(err),
//!         }
//!     }
//! ```

use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use thiserror::Error;

use crate::http::request::{split_target, Request};
use crate::net::buffer::ConnectionBuffer;

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors produced while framing a request unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The request line did not have exactly three tokens.
    #[error("Invalid request line: {line:?}")]
    MalformedRequestLine { line: String },

    /// No header terminator within the configured head size.
    #[error("Request header block exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    /// `Content-Length` could not be parsed or was contradictory.
    #[error("Invalid Content-Length header: {value:?}")]
    InvalidContentLength { value: String },

    /// Declared body is larger than allowed.
    #[error("Request body of {length} bytes exceeds {limit} bytes")]
    BodyTooLarge { length: usize, limit: usize },

    /// Chunked or other transfer codings are not supported.
    #[error("Unsupported Transfer-Encoding: {value:?}")]
    UnsupportedTransferEncoding { value: String },
}

impl FrameError {
    /// HTTP status used for the error response.
    pub fn status(&self) -> u16 {
        match self {
            FrameError::MalformedRequestLine { .. } => 400,
            FrameError::HeadersTooLarge { .. } => 431,
            FrameError::InvalidContentLength { .. } => 400,
            FrameError::BodyTooLarge { .. } => 413,
            FrameError::UnsupportedTransferEncoding { .. } => 501,
        }
    }

    /// Whether the connection can keep reading after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::MalformedRequestLine { .. })
    }
}

/// Size limits applied while framing.
#[derive(Debug, Clone, Copy)]
pub struct FramerLimits {
    /// Maximum bytes in the request line plus headers plus terminator.
    pub max_header_bytes: usize,
    /// Maximum accepted `Content-Length`.
    pub max_body_bytes: usize,
}

impl Default for FramerLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Result of one extraction attempt.
#[derive(Debug)]
pub enum Frame {
    /// Not enough bytes buffered yet; read more.
    Incomplete,
    /// A complete request unit.
    Request(Request),
    /// A unit that must be answered with an error response.
    Rejected(FrameError),
}

/// Splits a connection's byte stream into request units.
#[derive(Debug)]
pub struct RequestFramer {
    buffer: ConnectionBuffer,
    limits: FramerLimits,
}

impl RequestFramer {
    pub fn new(limits: FramerLimits) -> Self {
        Self {
            buffer: ConnectionBuffer::new(),
            limits,
        }
    }

    /// Extend the buffer with freshly read bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.append(bytes);
    }

    /// The underlying buffer, for reading directly from a socket.
    pub fn buffer_mut(&mut self) -> &mut ConnectionBuffer {
        &mut self.buffer
    }

    /// Number of buffered, not yet framed bytes.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Try to frame the next request unit from the front of the buffer.
    pub fn try_extract_one(&mut self) -> Frame {
        self.skip_leading_blank_lines();

        let buf = self.buffer.as_bytes();
        let Some(head_end) = find(buf, HEADER_TERMINATOR) else {
            if buf.len() > self.limits.max_header_bytes {
                return Frame::Rejected(FrameError::HeadersTooLarge {
                    limit: self.limits.max_header_bytes,
                });
            }
            return Frame::Incomplete;
        };
        let head_len = head_end + HEADER_TERMINATOR.len();
        if head_len > self.limits.max_header_bytes {
            return Frame::Rejected(FrameError::HeadersTooLarge {
                limit: self.limits.max_header_bytes,
            });
        }

        let head = &buf[..head_end];
        let line_end = find(head, CRLF).unwrap_or(head.len());

        let (method, target, version) = match parse_request_line(&head[..line_end]) {
            Some(parts) => parts,
            None => {
                let line = String::from_utf8_lossy(&head[..line_end]).into_owned();
                self.buffer.advance(head_len);
                return Frame::Rejected(FrameError::MalformedRequestLine { line });
            }
        };

        let headers = parse_headers(&head[line_end..]);

        if let Some(te) = headers.get(TRANSFER_ENCODING) {
            let value = String::from_utf8_lossy(te.as_bytes()).into_owned();
            if !value.trim().eq_ignore_ascii_case("identity") {
                return Frame::Rejected(FrameError::UnsupportedTransferEncoding { value });
            }
        }

        let content_length = match content_length(&headers) {
            Ok(n) => n,
            Err(e) => return Frame::Rejected(e),
        };
        if content_length > self.limits.max_body_bytes {
            return Frame::Rejected(FrameError::BodyTooLarge {
                length: content_length,
                limit: self.limits.max_body_bytes,
            });
        }

        let total = head_len + content_length;
        if buf.len() < total {
            return Frame::Incomplete;
        }

        let unit = self.buffer.split_to(total).freeze();
        let (path, query) = split_target(&target);
        let mut request = Request::new(method, "/");
        request.path = path;
        request.query = query;
        request.version = version;
        request.headers = headers;
        request.body = unit.slice(head_len..);
        Frame::Request(request)
    }

    /// Drop empty lines that precede a request line.
    fn skip_leading_blank_lines(&mut self) {
        loop {
            let buf = self.buffer.as_bytes();
            if buf.starts_with(CRLF) {
                self.buffer.advance(CRLF.len());
            } else if buf.starts_with(b"\n") {
                self.buffer.advance(1);
            } else {
                break;
            }
        }
    }
}

impl Default for RequestFramer {
    fn default() -> Self {
        Self::new(FramerLimits::default())
    }
}

/// Parse `METHOD TARGET VERSION`. Exactly three whitespace-separated tokens.
fn parse_request_line(line: &[u8]) -> Option<(Method, String, String)> {
    let line = std::str::from_utf8(line).ok()?;
    let mut tokens = line.split_ascii_whitespace();
    let method = tokens.next()?;
    let target = tokens.next()?;
    let version = tokens.next()?;
    if tokens.next().is_some() {
        return None;
    }
    let method = Method::from_bytes(method.as_bytes()).ok()?;
    Some((method, target.to_string(), version.to_string()))
}

/// Parse `name: value` lines. Lines without a colon or with an invalid name are skipped.
fn parse_headers(block: &[u8]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for line in block.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let name = line[..colon].trim_ascii();
        let value = line[colon + 1..].trim_ascii();
        match (
            HeaderName::from_bytes(name),
            HeaderValue::from_bytes(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(
                line = %String::from_utf8_lossy(line),
                "Skipping unparsable header line"
            ),
        }
    }
    headers
}

/// Declared body length. Absent means zero; repeated values must agree.
/// Only plain decimal digits are accepted, so `+3` or `-0` are rejected.
fn content_length(headers: &HeaderMap) -> Result<usize, FrameError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let raw = String::from_utf8_lossy(value.as_bytes()).into_owned();
        let digits = raw.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FrameError::InvalidContentLength { value: raw });
        }
        let parsed: usize = digits
            .parse()
            .map_err(|_| FrameError::InvalidContentLength { value: raw.clone() })?;
        match length {
            Some(prev) if prev != parsed => {
                return Err(FrameError::InvalidContentLength { value: raw });
            }
            _ => length = Some(parsed),
        }
    }
    Ok(length.unwrap_or(0))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_all(framer: &mut RequestFramer) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            match framer.try_extract_one() {
                Frame::Incomplete => break,
                frame => frames.push(frame),
            }
        }
        frames
    }

    fn summary(frame: &Frame) -> String {
        match frame {
            Frame::Request(r) => format!(
                "{} {} {:?} {:?}",
                r.method,
                r.path,
                r.header("host"),
                String::from_utf8_lossy(&r.body)
            ),
            Frame::Rejected(e) => format!("rejected {}", e.status()),
            Frame::Incomplete => "incomplete".to_string(),
        }
    }

    const STREAM: &[u8] = b"GET /api/health HTTP/1.1\r\nHost: x\r\n\r\n\
POST /api/cars?x=1 HTTP/1.1\r\nHost: y\r\nContent-Length: 11\r\n\r\n{\"plate\":1}\
DELETE /api/cars/AB HTTP/1.1\r\n\r\n";

    #[test]
    fn single_get() {
        let mut framer = RequestFramer::default();
        framer.append(b"GET /api/health?verbose=true HTTP/1.1\r\nHost: x\r\n\r\n");
        let Frame::Request(req) = framer.try_extract_one() else {
            panic!("expected a request");
        };
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/api/health");
        assert_eq!(req.version, "HTTP/1.1");
        assert_eq!(req.query("verbose"), Some("true"));
        assert_eq!(req.header("HOST"), Some("x"));
        assert!(req.body.is_empty());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn missing_separator_is_incomplete_and_untouched() {
        let mut framer = RequestFramer::default();
        framer.append(b"GET / HTTP/1.1\r\nHost: x\r\n");
        assert!(matches!(framer.try_extract_one(), Frame::Incomplete));
        assert_eq!(framer.buffered(), 25);
    }

    #[test]
    fn partial_body_waits_for_more_bytes() {
        let mut framer = RequestFramer::default();
        framer.append(b"POST /api/cars HTTP/1.1\r\nContent-Length: 27\r\n\r\n0123456789");
        let before = framer.buffered();
        assert!(matches!(framer.try_extract_one(), Frame::Incomplete));
        assert_eq!(framer.buffered(), before);

        framer.append(b"abcdefghijklmnopq");
        let Frame::Request(req) = framer.try_extract_one() else {
            panic!("expected a request");
        };
        assert_eq!(&req.body[..], b"0123456789abcdefghijklmnopq");
        assert!(matches!(framer.try_extract_one(), Frame::Incomplete));
    }

    #[test]
    fn pipelined_requests_in_order() {
        let mut framer = RequestFramer::default();
        framer.append(STREAM);
        let frames = extract_all(&mut framer);
        let summaries: Vec<_> = frames.iter().map(summary).collect();
        assert_eq!(
            summaries,
            vec![
                "GET /api/health Some(\"x\") \"\"".to_string(),
                "POST /api/cars Some(\"y\") \"{\\\"plate\\\":1}\"".to_string(),
                "DELETE /api/cars/AB None \"\"".to_string(),
            ]
        );
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn chunking_does_not_change_framing() {
        let mut whole = RequestFramer::default();
        whole.append(STREAM);
        let expected: Vec<_> = extract_all(&mut whole).iter().map(summary).collect();

        for chunk_size in [1, 2, 3, 7, 16, 40] {
            let mut framer = RequestFramer::default();
            let mut got = Vec::new();
            for chunk in STREAM.chunks(chunk_size) {
                framer.append(chunk);
                got.extend(extract_all(&mut framer).iter().map(summary));
            }
            assert_eq!(got, expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn malformed_line_is_recovered() {
        let mut framer = RequestFramer::default();
        framer.append(b"GARBAGE\r\n\r\nGET /api/health HTTP/1.1\r\nHost: x\r\n\r\n");
        let frames = extract_all(&mut framer);
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            Frame::Rejected(FrameError::MalformedRequestLine { line }) => {
                assert_eq!(line, "GARBAGE")
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(matches!(&frames[1], Frame::Request(r) if r.path == "/api/health"));
    }

    #[test]
    fn malformed_head_with_headers_is_one_rejection() {
        let mut framer = RequestFramer::default();
        framer.append(
            b"GET /a b HTTP/1.1\r\nHost: x\r\nAccept: */*\r\n\r\nGET /ok HTTP/1.1\r\nHost: x\r\n\r\n",
        );
        let summaries: Vec<_> = extract_all(&mut framer).iter().map(summary).collect();
        assert_eq!(
            summaries,
            vec![
                "rejected 400".to_string(),
                "GET /ok Some(\"x\") \"\"".to_string(),
            ]
        );
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn malformed_head_split_across_reads() {
        let mut framer = RequestFramer::default();
        framer.append(b"BROKEN\r\nHost: x\r\n");
        assert!(matches!(framer.try_extract_one(), Frame::Incomplete));

        framer.append(b"\r\nGET /ok HTTP/1.1\r\n\r\n");
        let summaries: Vec<_> = extract_all(&mut framer).iter().map(summary).collect();
        assert_eq!(
            summaries,
            vec!["rejected 400".to_string(), "GET /ok None \"\"".to_string()]
        );
    }

    #[test]
    fn too_many_tokens_is_malformed() {
        let mut framer = RequestFramer::default();
        framer.append(b"GET / HTTP/1.1 extra\r\n\r\n");
        let Frame::Rejected(err) = framer.try_extract_one() else {
            panic!("expected rejection");
        };
        assert!(err.is_recoverable());
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn oversized_head_is_fatal() {
        let mut framer = RequestFramer::new(FramerLimits {
            max_header_bytes: 32,
            max_body_bytes: 1024,
        });
        framer.append(b"GET / HTTP/1.1\r\nX-Padding: aaaaaaaaaaaaaaaaaaaaaaaaa");
        let Frame::Rejected(err) = framer.try_extract_one() else {
            panic!("expected rejection");
        };
        assert_eq!(err, FrameError::HeadersTooLarge { limit: 32 });
        assert!(!err.is_recoverable());
    }

    #[test]
    fn content_length_errors() {
        let mut framer = RequestFramer::default();
        framer.append(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n");
        assert!(matches!(
            framer.try_extract_one(),
            Frame::Rejected(FrameError::InvalidContentLength { .. })
        ));

        for value in ["+3", "-0", "3 3", ""] {
            let mut framer = RequestFramer::default();
            let raw = format!("POST / HTTP/1.1\r\nContent-Length: {value}\r\n\r\nabc");
            framer.append(raw.as_bytes());
            let frame = framer.try_extract_one();
            assert!(
                matches!(frame, Frame::Rejected(FrameError::InvalidContentLength { .. })),
                "{value:?} gave {frame:?}"
            );
        }

        let mut framer = RequestFramer::new(FramerLimits {
            max_header_bytes: 1024,
            max_body_bytes: 4,
        });
        framer.append(b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        assert!(matches!(
            framer.try_extract_one(),
            Frame::Rejected(FrameError::BodyTooLarge { length: 5, limit: 4 })
        ));
    }

    #[test]
    fn chunked_bodies_are_rejected() {
        let mut framer = RequestFramer::default();
        framer.append(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        let Frame::Rejected(err) = framer.try_extract_one() else {
            panic!("expected rejection");
        };
        assert_eq!(err.status(), 501);
    }
}
