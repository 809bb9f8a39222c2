//! Capture failure taxonomy.

use hyper::StatusCode;
use thiserror::Error;

/// Which configured limit a request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Request line plus header section, or a trailer section.
    HeadBytes,
    /// Number of header fields.
    HeaderCount,
    /// Decoded body length.
    BodyBytes,
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::HeadBytes => write!(f, "header section size"),
            Limit::HeaderCount => write!(f, "header count"),
            Limit::BodyBytes => write!(f, "body size"),
        }
    }
}

/// Errors that end the handling of a request.
///
/// Everything except [`CaptureError::Transport`] is answered with a 4xx status
/// and a closed connection. A transport failure just ends the connection.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The parser rejected the request line, a header, or the body framing.
    #[error("decode failure: {0}")]
    Decode(String),

    /// The request target could not be decoded.
    #[error("request target encoding failure: {0}")]
    TargetEncoding(String),

    /// A configured limit was exceeded while reading the request.
    #[error("{limit} exceeds limit of {max}")]
    LimitExceeded { limit: Limit, max: usize },

    /// Connection reset, I/O error, or a transport-level timeout.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
}

impl CaptureError {
    /// Status sent back to the client, if any response is sent at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CaptureError::Decode(_) | CaptureError::TargetEncoding(_) => {
                Some(StatusCode::BAD_REQUEST)
            }
            CaptureError::LimitExceeded { limit: Limit::BodyBytes, .. } => {
                Some(StatusCode::PAYLOAD_TOO_LARGE)
            }
            CaptureError::LimitExceeded { .. } => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            CaptureError::Transport(_) => None,
        }
    }

    /// Returns true if the failure came from the transport, not the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, CaptureError::Transport(_))
    }
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_bad_request() {
        assert_eq!(
            CaptureError::Decode("bad chunk".into()).status(),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            CaptureError::TargetEncoding("bad target".into()).status(),
            Some(StatusCode::BAD_REQUEST)
        );
    }

    #[test]
    fn limit_statuses_stay_in_4xx() {
        let body = CaptureError::LimitExceeded { limit: Limit::BodyBytes, max: 10 };
        let head = CaptureError::LimitExceeded { limit: Limit::HeadBytes, max: 10 };
        let count = CaptureError::LimitExceeded { limit: Limit::HeaderCount, max: 10 };

        for err in [body, head, count] {
            let status = err.status().unwrap();
            assert!(status.is_client_error(), "{status} for {err}");
        }
    }

    #[test]
    fn transport_failures_send_nothing() {
        let err = CaptureError::from(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(err.is_transport());
        assert_eq!(err.status(), None);
    }
}
