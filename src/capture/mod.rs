//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! Backend-native request
//!     → backend adapter (extract method, target, version, headers, body)
//!     → request.rs (CapturedRequest, raw bytes only)
//!     → document.rs (base64 every field, fixed key order)
//!     → JSON response body
//! ```
//!
//! # Design Decisions
//! - Every field is an opaque byte sequence; nothing is trimmed or case-folded
//! - Encoding is pure and infallible once a CapturedRequest exists
//! - Key order is fixed: method, uri, version, headers, body
//! - Parse failures never reach the encoder (see error.rs)

pub mod document;
pub mod error;
pub mod request;

pub use document::{CaptureDocument, DocumentError};
pub use error::{CaptureError, Limit};
pub use request::CapturedRequest;
