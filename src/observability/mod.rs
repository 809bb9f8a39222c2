//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → tower-http TraceLayer spans on the hyper backend
//!
//! Consumers:
//!     → stdout, human-readable or JSON lines
//! ```
//!
//! # Design Decisions
//! - Connection IDs are attached to every per-connection event
//! - Capture contents are never logged above debug, and only as sizes

pub mod logging;

pub use logging::init;
