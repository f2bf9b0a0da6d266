//! Parking server: a hand-built HTTP/1.1 service layer.
//!
//! Incremental request framing with pipelining, a pattern router with
//! per-route middleware chains, a response assembler and a bounded,
//! blocking pool of backing-store connections.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Router, RouterBuilder};
pub use store::ConnectionPool;
