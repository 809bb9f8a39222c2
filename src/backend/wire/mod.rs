//! In-crate HTTP/1.x backend.
//!
//! # Data Flow
//! ```text
//! TCP stream
//!     → conn.rs (per-connection read buffer, request loop)
//!     → head.rs (request line + headers via httparse)
//!     → body.rs (Content-Length / chunked framing)
//!     → WireAdapter → CapturedRequest → response
//! ```
//!
//! # Connection States
//! ```text
//! AwaitingRequestLine → AwaitingHeaders → AwaitingBody → Complete
//!          └────────────────┴────────────────┴──────────→ Failed
//! ```
//! `Complete` answers with a capture document and, if keep-alive allows,
//! starts over at `AwaitingRequestLine`. `Failed` answers 4xx and closes.
//!
//! Unlike the hyper backend, header order across different names and
//! duplicates is exactly the wire order.

pub mod body;
pub mod conn;
pub mod head;

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::backend::{ConnectionOutcome, RequestAdapter};
use crate::capture::error::CaptureResult;
use crate::capture::CapturedRequest;
use crate::config::{LimitsConfig, TimeoutConfig};
use crate::net::ConnectionId;

pub use conn::WireConnection;
pub use head::{Framing, RequestHead};

/// Where a connection is in reading the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRequestLine,
    AwaitingHeaders,
    AwaitingBody,
    Complete,
    Failed,
}

/// A fully framed request: parsed head plus the aggregated body.
#[derive(Debug, Clone)]
pub struct FramedRequest {
    pub head: RequestHead,
    pub body: Bytes,
}

/// Maps a framed request onto a capture. The head is already raw bytes, so
/// this is a straight move of every field.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireAdapter;

impl RequestAdapter for WireAdapter {
    type Request = FramedRequest;

    async fn capture(&self, request: FramedRequest) -> CaptureResult<CapturedRequest> {
        let FramedRequest { head, body } = request;
        Ok(CapturedRequest {
            method: head.method,
            target: head.target,
            version: head.version,
            headers: head.headers,
            body,
        })
    }
}

/// The wire backend: settings shared by every connection it serves.
#[derive(Debug, Clone)]
pub struct WireBackend {
    limits: LimitsConfig,
    idle_timeout: Duration,
}

impl WireBackend {
    pub fn new(limits: LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            limits,
            idle_timeout: Duration::from_secs(timeouts.idle_secs),
        }
    }

    /// Serve every request on one connection until it closes or fails.
    pub async fn serve<S>(&self, io: S, id: ConnectionId) -> ConnectionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        WireConnection::new(io, self.limits.clone(), self.idle_timeout, id)
            .run()
            .await
    }
}
