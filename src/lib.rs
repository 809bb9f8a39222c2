//! HTTP capture echo library.
//!
//! Every request received is answered with a JSON document that carries the
//! request's method, target, version, headers and body, each base64-encoded
//! exactly as the selected parser delivered them.

pub mod backend;
pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use backend::{Backend, ConnectionOutcome, RequestAdapter};
pub use capture::{CaptureDocument, CaptureError, CapturedRequest};
pub use config::schema::CaptureConfig;
pub use http::CaptureServer;
pub use lifecycle::{Shutdown, ShutdownSignal};
