//! Request/response interceptors run by the router before a handler.
//!
//! # Data Flow
//! ```text
//! matched route
//!     → global prefix chain (registered on the RouterBuilder)
//!     → route-specific middleware
//!     → handler
//! ```
//! Each middleware returns [`Flow::Continue`] to pass control on, or
//! [`Flow::Halt`] after it has written a complete response itself.
//!
//! # Design Decisions
//! - Middleware sees only the request, the response and the request
//!   context; collaborators (token store, log sink) are injected at
//!   construction, never looked up globally
//! - Plain closures implement the trait, so one-off interceptors need no type

pub mod auth;
pub mod json_body;
pub mod logger;

use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::Response;

pub use auth::{BearerAuth, StaticTokenStore, TokenStore};
pub use json_body::JsonBody;
pub use logger::{LogSink, RequestLogger, TracingSink};

/// Outcome of one middleware step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next middleware (or the handler).
    Continue,
    /// Stop here; the response is already complete.
    Halt,
}

/// A request/response interceptor.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &mut Request, resp: &mut Response) -> Flow;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response) -> Flow + Send + Sync,
{
    fn handle(&self, req: &mut Request, resp: &mut Response) -> Flow {
        self(req, resp)
    }
}

/// Shared handle used in route chains.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// Run `chain` in order. Returns `Flow::Halt` as soon as one element halts.
pub fn run_chain(chain: &[SharedMiddleware], req: &mut Request, resp: &mut Response) -> Flow {
    for middleware in chain {
        if middleware.handle(req, resp) == Flow::Halt {
            return Flow::Halt;
        }
    }
    Flow::Continue
}
