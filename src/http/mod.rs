//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (per-connection loop)
//!     → framer.rs (bytes → Request units, pipelining)
//!     → [routing layer: middleware chain + handler]
//!     → response.rs (status, headers, JSON envelope)
//!     → assembler.rs (Response → wire bytes)
//!     → Send to client
//! ```

pub mod assembler;
pub mod framer;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use framer::{Frame, FrameError, FramerLimits, RequestFramer};
pub use middleware::{Flow, Middleware, SharedMiddleware};
pub use request::Request;
pub use response::{codes, ApiEnvelope, Response};
pub use server::{HttpServer, ServerSettings};
