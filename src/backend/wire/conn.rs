//! Per-connection request loop for the wire backend.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::backend::wire::body::BodyDecoder;
use crate::backend::wire::head::{self, HeadStatus};
use crate::backend::wire::{FramedRequest, Phase, WireAdapter};
use crate::backend::{ConnectionOutcome, RequestAdapter};
use crate::capture::error::CaptureResult;
use crate::capture::{CaptureError, CapturedRequest};
use crate::config::LimitsConfig;
use crate::http::response;
use crate::net::ConnectionId;

/// Initial read buffer capacity.
const READ_BUF_CAPACITY: usize = 8 * 1024;

/// How long a failed connection keeps draining input before closing, so the
/// peer reads the failure response instead of a reset.
const LINGER: Duration = Duration::from_millis(250);

/// One client connection and the buffer it owns.
pub struct WireConnection<S> {
    io: S,
    buf: BytesMut,
    phase: Phase,
    limits: LimitsConfig,
    idle_timeout: Duration,
    id: ConnectionId,
    captured: u64,
}

impl<S> WireConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S, limits: LimitsConfig, idle_timeout: Duration, id: ConnectionId) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(READ_BUF_CAPACITY),
            phase: Phase::AwaitingRequestLine,
            limits,
            idle_timeout,
            id,
            captured: 0,
        }
    }

    /// Current position in the request state machine.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Answer requests until the peer leaves, keep-alive ends, or a request fails.
    pub async fn run(mut self) -> ConnectionOutcome {
        loop {
            let (capture, keep_alive) = match self.next_request().await {
                Ok(Some(next)) => next,
                Ok(None) => return ConnectionOutcome::Closed,
                Err(err) => return self.fail(err).await,
            };
            self.captured += 1;

            tracing::debug!(
                connection_id = %self.id,
                method = %capture.method.escape_ascii(),
                headers = capture.headers.len(),
                body_bytes = capture.body.len(),
                keep_alive,
                "Request captured"
            );

            let head_only = capture.method == "HEAD";
            let response = response::encode_capture(&capture.to_json(), keep_alive, head_only);
            if let Err(e) = self.io.write_all(&response).await {
                tracing::debug!(connection_id = %self.id, error = %e, "Write failed");
                return ConnectionOutcome::Aborted;
            }

            if !keep_alive {
                let _ = self.io.shutdown().await;
                return ConnectionOutcome::Closed;
            }
        }
    }

    /// Read one complete request.
    ///
    /// Returns `None` when the peer closes (or idles out) cleanly between
    /// requests. The body buffer is created fresh for every request.
    async fn next_request(&mut self) -> CaptureResult<Option<(CapturedRequest, bool)>> {
        self.phase = Phase::AwaitingRequestLine;

        let head = loop {
            match head::parse_head(&mut self.buf, &self.limits)? {
                HeadStatus::Complete(head) => break head,
                HeadStatus::Partial(phase) => {
                    self.phase = phase;
                    if self.fill().await? == 0 {
                        if self.buf.is_empty() && phase == Phase::AwaitingRequestLine {
                            return Ok(None);
                        }
                        return Err(CaptureError::Decode(
                            "connection closed during request head".into(),
                        ));
                    }
                }
            }
        };

        self.phase = Phase::AwaitingBody;
        let framing = head.framing()?;
        let mut decoder = BodyDecoder::new(framing, &self.limits)?;
        if head.expects_continue() && !framing.is_empty() && self.buf.is_empty() {
            self.io.write_all(response::CONTINUE).await?;
        }

        let body = loop {
            if let Some(body) = decoder.decode(&mut self.buf)? {
                break body;
            }
            if self.fill().await? == 0 {
                return Err(CaptureError::Decode(
                    "connection closed during request body".into(),
                ));
            }
        };

        self.phase = Phase::Complete;
        let keep_alive = head.keep_alive();
        let capture = WireAdapter.capture(FramedRequest { head, body }).await?;
        Ok(Some((capture, keep_alive)))
    }

    /// Read more bytes into the connection buffer.
    ///
    /// An idle timeout between requests is a clean close; in the middle of a
    /// request it fails the request.
    async fn fill(&mut self) -> CaptureResult<usize> {
        let read = tokio::time::timeout(self.idle_timeout, self.io.read_buf(&mut self.buf)).await;
        match read {
            Ok(read) => Ok(read?),
            Err(_) if self.buf.is_empty() && self.phase == Phase::AwaitingRequestLine => {
                tracing::trace!(connection_id = %self.id, "Idle connection timed out");
                Ok(0)
            }
            Err(_) => Err(CaptureError::Decode("timed out waiting for request bytes".into())),
        }
    }

    async fn fail(mut self, err: CaptureError) -> ConnectionOutcome {
        let phase = self.phase;
        self.phase = Phase::Failed;

        let Some(status) = err.status() else {
            tracing::debug!(connection_id = %self.id, ?phase, error = %err, "Connection aborted");
            return ConnectionOutcome::Aborted;
        };

        tracing::debug!(
            connection_id = %self.id,
            ?phase,
            status = status.as_u16(),
            captured = self.captured,
            error = %err,
            "Request rejected"
        );

        if self.io.write_all(&response::encode_failure(status)).await.is_ok() {
            let _ = self.io.shutdown().await;
            self.linger().await;
        }
        ConnectionOutcome::Failed(status)
    }

    async fn linger(&mut self) {
        let mut scratch = [0u8; 1024];
        let drain = async {
            loop {
                match self.io.read(&mut scratch).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        let _ = tokio::time::timeout(LINGER, drain).await;
    }
}
