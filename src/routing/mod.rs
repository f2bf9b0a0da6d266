//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     RouterBuilder::route(method, pattern, middleware, handler)
//!     → pattern.rs (compile into segment matcher)
//!     → prepend global middleware prefix
//!     → build() freezes the table as an immutable Router
//!
//! Dispatch (per request):
//!     Request
//!     → router.rs (first route whose method and pattern match)
//!     → bind path parameters
//!     → middleware chain → handler.rs (handler result → envelope)
//!     → Response, or 404 when nothing matched
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison and `*` globbing only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by registration)

pub mod handler;
pub mod pattern;
pub mod router;

pub use handler::{Handler, HandlerError, HandlerResult};
pub use pattern::{PathPattern, PatternError};
pub use router::{RouteInfo, Router, RouterBuilder};
