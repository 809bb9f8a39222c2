//! Backend adapters.
//!
//! # Data Flow
//! ```text
//! Accepted connection
//!     → Backend (selected once from config)
//!         → hyper_conn.rs (hyper parses; HyperAdapter reads its Request)
//!         → wire/        (httparse + in-crate framing; WireAdapter)
//!     → RequestAdapter::capture → CapturedRequest
//!     → capture document or failure response
//! ```
//!
//! # Design Decisions
//! - The capture layer only sees `CapturedRequest`, never backend types
//! - Adapters add no normalization on top of their parser and remove none
//! - A failed request never yields a partial capture; the connection closes

pub mod hyper_conn;
pub mod wire;

use std::future::Future;

use hyper::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::capture::error::CaptureResult;
use crate::capture::CapturedRequest;
use crate::config::{BackendKind, CaptureConfig};
use crate::net::ConnectionId;

pub use hyper_conn::{HyperAdapter, HyperBackend};
pub use wire::{WireAdapter, WireBackend};

/// Bridges one parser's request representation into a capture.
///
/// Implementations either return the complete capture or fail; there is no
/// partial result.
pub trait RequestAdapter {
    /// The backend-native request type.
    type Request;

    /// Extract every field and aggregate the body.
    fn capture(
        &self,
        request: Self::Request,
    ) -> impl Future<Output = CaptureResult<CapturedRequest>> + Send;
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The peer went away, keep-alive ended, or the connection idled out.
    Closed,
    /// A request was rejected with this status and the connection closed.
    Failed(StatusCode),
    /// The transport failed.
    Aborted,
}

/// The backend chosen at deploy time.
#[derive(Debug, Clone)]
pub enum Backend {
    Hyper(HyperBackend),
    Wire(WireBackend),
}

impl Backend {
    pub fn from_config(config: &CaptureConfig) -> Self {
        match config.backend {
            BackendKind::Hyper => {
                Backend::Hyper(HyperBackend::new(&config.limits, &config.timeouts))
            }
            BackendKind::Wire => {
                Backend::Wire(WireBackend::new(config.limits.clone(), &config.timeouts))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Hyper(_) => BackendKind::Hyper,
            Backend::Wire(_) => BackendKind::Wire,
        }
    }

    /// Serve one connection to completion.
    pub async fn serve<S>(&self, io: S, id: ConnectionId) -> ConnectionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        match self {
            Backend::Hyper(backend) => backend.serve(io, id).await,
            Backend::Wire(backend) => backend.serve(io, id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_follows_config() {
        let mut config = CaptureConfig::default();
        assert_eq!(Backend::from_config(&config).kind(), BackendKind::Hyper);

        config.backend = BackendKind::Wire;
        assert_eq!(Backend::from_config(&config).kind(), BackendKind::Wire);
    }
}
