//! Handler signature and the errors handlers may return.
//!
//! # Design Decisions
//! - Handlers return `Result` so pool and store failures propagate with `?`
//! - The router, not the handler, turns an error into an envelope response

use std::sync::Arc;

use thiserror::Error;

use crate::http::request::Request;
use crate::http::response::{codes, Response};
use crate::store::{PoolError, StoreError};

/// Outcome of a handler invocation.
pub type HandlerResult = Result<(), HandlerError>;

/// A registered route handler.
pub type Handler = Arc<dyn Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync>;

/// Failures a handler reports back to the router.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    Unauthorized(String),

    /// A resource addressed by a matched route does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status(&self) -> u16 {
        match self {
            HandlerError::BadRequest(_) | HandlerError::InvalidParameter(_) => 400,
            HandlerError::Unauthorized(_) => 401,
            HandlerError::NotFound(_) => 404,
            HandlerError::Pool(e) if e.is_exhausted() => 503,
            _ => 500,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            HandlerError::BadRequest(_) => codes::BAD_REQUEST,
            HandlerError::InvalidParameter(_) => codes::INVALID_PARAMETER,
            HandlerError::Unauthorized(_) => codes::UNAUTHORIZED,
            HandlerError::NotFound(_) => codes::RESOURCE_NOT_FOUND,
            HandlerError::Pool(e) if e.is_exhausted() => codes::SERVICE_UNAVAILABLE,
            _ => codes::SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            HandlerError::BadRequest(msg)
            | HandlerError::InvalidParameter(msg)
            | HandlerError::Unauthorized(msg)
            | HandlerError::NotFound(msg) => msg.clone(),
            HandlerError::Pool(e) if e.is_exhausted() => "Backing store unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Overwrite `resp` with the error envelope for this failure.
    pub fn apply(&self, resp: &mut Response) {
        let status = self.status();
        if status >= 500 {
            tracing::error!(status, error = %self, "Handler failed");
        } else {
            tracing::debug!(status, error = %self, "Handler rejected request");
        }
        resp.error(status, self.code(), self.public_message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn maps_errors_to_envelopes() {
        let cases = [
            (HandlerError::BadRequest("bad plate".into()), 400, 4001, "bad plate"),
            (HandlerError::InvalidParameter("slot".into()), 400, 4002, "slot"),
            (HandlerError::Unauthorized("no".into()), 401, 4011, "no"),
            (HandlerError::NotFound("car not found".into()), 404, 4042, "car not found"),
            (
                HandlerError::from(PoolError::Timeout(Duration::from_millis(5))),
                503,
                5003,
                "Backing store unavailable",
            ),
            (HandlerError::from(PoolError::Closed), 500, 5001, "Internal server error"),
            (
                HandlerError::from(StoreError::ConnectionLost),
                500,
                5001,
                "Internal server error",
            ),
        ];

        for (err, status, code, msg) in cases {
            let mut resp = Response::new();
            err.apply(&mut resp);
            assert_eq!(resp.status, status, "{err:?}");
            let body = resp.body_json().unwrap();
            assert_eq!(body["code"], code);
            assert_eq!(body["msg"], msg);
        }
    }
}
