//! HTTP serving.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, per-connection task)
//!     → backend (hyper or wire) parses and captures
//!     → response.rs (capture document or failure response)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use server::CaptureServer;
