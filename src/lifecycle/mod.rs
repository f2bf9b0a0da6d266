//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections → Close pool → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: connections still open after the drain
//!   deadline are abandoned

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
