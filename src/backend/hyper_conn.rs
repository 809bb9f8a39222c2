//! hyper backend.
//!
//! hyper owns parsing, keep-alive and protocol detection (HTTP/1.1 or h2c
//! prior knowledge through the hyper-util auto builder). The adapter only
//! reads what hyper exposes:
//! - method via `Method::as_str`
//! - target via the `Uri` rendering, so absolute-form and h2 requests carry
//!   scheme and authority
//! - version as "0.9", "1.0", "1.1", "2" or "3"
//! - headers in `HeaderMap` iteration order: names lowercased, values of a
//!   repeated name grouped together at the first occurrence
//!
//! Those are hyper's interpretations and are captured as-is. Parse errors in
//! the request head are answered by hyper itself before any service runs.

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode, Version};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::backend::{ConnectionOutcome, RequestAdapter};
use crate::capture::error::CaptureResult;
use crate::capture::{CaptureError, CapturedRequest, Limit};
use crate::config::{LimitsConfig, TimeoutConfig};
use crate::http::response;
use crate::net::{ActivityIo, ConnectionId};

/// Turns a hyper request into a capture, buffering the whole body.
#[derive(Debug, Clone, Copy)]
pub struct HyperAdapter {
    max_body_bytes: usize,
}

impl HyperAdapter {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Capture a request and build the response for it.
    pub async fn respond(&self, request: Request<Incoming>) -> Response<Full<Bytes>> {
        let version = request.version();
        match self.capture(request).await {
            Ok(capture) => response::capture_response(capture.to_json()),
            Err(err) => {
                let status = err.status().unwrap_or(StatusCode::BAD_REQUEST);
                tracing::debug!(status = status.as_u16(), error = %err, "Request rejected");
                response::failure_response(status, version)
            }
        }
    }
}

impl RequestAdapter for HyperAdapter {
    type Request = Request<Incoming>;

    async fn capture(&self, request: Request<Incoming>) -> CaptureResult<CapturedRequest> {
        let (parts, body) = request.into_parts();

        let mut capture = CapturedRequest::new(
            Bytes::copy_from_slice(parts.method.as_str().as_bytes()),
            Bytes::from(parts.uri.to_string()),
            version_label(parts.version),
        );
        for (name, value) in &parts.headers {
            capture.push_header(
                Bytes::copy_from_slice(name.as_str().as_bytes()),
                Bytes::copy_from_slice(value.as_bytes()),
            );
        }

        let body = Limited::new(body, self.max_body_bytes)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    CaptureError::LimitExceeded {
                        limit: Limit::BodyBytes,
                        max: self.max_body_bytes,
                    }
                } else {
                    CaptureError::Decode(e.to_string())
                }
            })?
            .to_bytes();

        Ok(capture.with_body(body))
    }
}

fn version_label(version: Version) -> Bytes {
    let label = match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "",
    };
    Bytes::from_static(label.as_bytes())
}

/// The hyper backend.
#[derive(Debug, Clone)]
pub struct HyperBackend {
    adapter: HyperAdapter,
    idle_timeout: Duration,
}

impl HyperBackend {
    pub fn new(limits: &LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            adapter: HyperAdapter::new(limits.max_body_bytes),
            idle_timeout: Duration::from_secs(timeouts.idle_secs),
        }
    }

    /// Hand one connection to hyper and wait for it to finish.
    ///
    /// A connection on which no byte moves for the idle timeout is dropped
    /// without a response. That covers the protocol sniffing of the auto
    /// builder, which has no deadline of its own, and idle h2 connections.
    pub async fn serve<S>(&self, io: S, id: ConnectionId) -> ConnectionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let adapter = self.adapter;
        let service = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .service_fn(move |request: Request<Incoming>| async move {
                Ok::<_, Infallible>(adapter.respond(request).await)
            });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.idle_timeout);

        let (io, activity) = ActivityIo::new(io);
        let connection =
            builder.serve_connection(TokioIo::new(io), TowerToHyperService::new(service));

        let result = tokio::select! {
            result = connection => result,
            _ = activity.idle(self.idle_timeout) => {
                tracing::trace!(connection_id = %id, "Idle connection timed out");
                return ConnectionOutcome::Closed;
            }
        };

        match result {
            Ok(()) => ConnectionOutcome::Closed,
            Err(err) => {
                let outcome = match err.downcast_ref::<hyper::Error>() {
                    Some(e) if e.is_parse_too_large() => {
                        ConnectionOutcome::Failed(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
                    }
                    Some(e) if e.is_parse() => ConnectionOutcome::Failed(StatusCode::BAD_REQUEST),
                    Some(e) if e.is_timeout() => ConnectionOutcome::Closed,
                    _ => ConnectionOutcome::Aborted,
                };
                tracing::debug!(connection_id = %id, error = %err, ?outcome, "hyper connection ended with error");
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use hyper::client::conn::http2;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    use crate::capture::CaptureDocument;

    fn backend() -> HyperBackend {
        HyperBackend::new(&LimitsConfig::default(), &TimeoutConfig::default())
    }

    async fn exchange(raw: &[u8]) -> (ConnectionOutcome, String) {
        let (mut client, server) = duplex(64 * 1024);
        let backend = backend();
        let task = tokio::spawn(async move { backend.serve(server, ConnectionId::new()).await });

        client.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        (task.await.unwrap(), String::from_utf8_lossy(&out).into_owned())
    }

    fn document(response: &str) -> CapturedRequest {
        let (_, body) = response.split_once("\r\n\r\n").unwrap();
        CaptureDocument::from_json(body.as_bytes()).unwrap().decode().unwrap()
    }

    /// Send one request over h2 prior knowledge; returns status and body.
    async fn h2_exchange(backend: HyperBackend, request: Request<Full<Bytes>>) -> (StatusCode, Bytes) {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(async move { backend.serve(server, ConnectionId::new()).await });

        let (mut sender, connection) = http2::handshake(TokioExecutor::new(), TokioIo::new(client))
            .await
            .unwrap();
        tokio::spawn(connection);

        let response = sender.send_request(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    #[tokio::test]
    async fn captures_what_hyper_parsed() {
        let (outcome, response) = exchange(
            b"POST /path?x=1&y=2 HTTP/1.1\r\nHost: a\r\nConnection: close\r\nContent-Length: 4\r\n\r\nbody",
        )
        .await;
        assert_eq!(outcome, ConnectionOutcome::Closed);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

        let capture = document(&response);
        assert_eq!(capture.method, "POST");
        assert_eq!(capture.target, "/path?x=1&y=2");
        assert_eq!(capture.version, "1.1");
        assert_eq!(capture.body, "body");
    }

    #[tokio::test]
    async fn header_map_groups_repeated_names() {
        let (_, response) =
            exchange(b"GET / HTTP/1.1\r\nA: 1\r\nb: 2\r\nA: 3\r\nConnection: close\r\n\r\n").await;
        let capture = document(&response);
        let names: Vec<&[u8]> = capture.headers.iter().map(|(n, _)| &n[..]).collect();
        assert_eq!(names, vec![&b"a"[..], b"a", b"b", b"connection"]);
    }

    #[tokio::test]
    async fn chunked_body_is_decoded() {
        let (_, response) = exchange(
            b"PUT / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n",
        )
        .await;
        assert!(response.contains(&format!("\"body\":\"{}\"", STANDARD.encode("abcde"))));
    }

    #[tokio::test]
    async fn invalid_chunk_is_bad_request_and_closes() {
        let (_, response) = exchange(
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nabc\r\n0\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.to_ascii_lowercase().contains("connection: close\r\n"));
        assert!(!response.contains("\"method\""));
    }

    #[tokio::test]
    async fn malformed_request_line_is_rejected_by_hyper() {
        let (outcome, response) = exchange(b"GET /\x01 HTTP/1.1\r\n\r\n").await;
        assert_eq!(outcome, ConnectionOutcome::Failed(StatusCode::BAD_REQUEST));
        assert!(response.starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn h2_prior_knowledge_is_captured() {
        let request = Request::builder()
            .method("PUT")
            .uri("http://capture.test/h2?x=1")
            .header("x-capture", "one")
            .body(Full::new(Bytes::from_static(b"over h2")))
            .unwrap();

        let (status, body) = h2_exchange(backend(), request).await;
        assert_eq!(status, StatusCode::OK);

        let capture = CaptureDocument::from_json(&body).unwrap().decode().unwrap();
        assert_eq!(capture.method, "PUT");
        assert_eq!(capture.target, "http://capture.test/h2?x=1");
        assert_eq!(capture.version, "2");
        assert_eq!(capture.body, "over h2");
        assert!(capture
            .headers
            .iter()
            .any(|(n, v)| n == "x-capture" && v == "one"));
    }

    #[tokio::test]
    async fn h2_body_over_limit_is_payload_too_large() {
        let limits = LimitsConfig {
            max_body_bytes: 4,
            ..LimitsConfig::default()
        };
        let backend = HyperBackend::new(&limits, &TimeoutConfig::default());
        let request = Request::builder()
            .method("POST")
            .uri("http://capture.test/")
            .body(Full::new(Bytes::from_static(b"0123456789")))
            .unwrap();

        let (status, body) = h2_exchange(backend, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn silent_connection_is_dropped_after_idle_timeout() {
        let timeouts = TimeoutConfig {
            idle_secs: 1,
            ..TimeoutConfig::default()
        };
        let backend = HyperBackend::new(&LimitsConfig::default(), &timeouts);
        let (mut client, server) = duplex(1024);
        let task = tokio::spawn(async move { backend.serve(server, ConnectionId::new()).await });

        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut out))
            .await
            .expect("idle connection was not closed")
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(task.await.unwrap(), ConnectionOutcome::Closed);
    }

    #[tokio::test]
    async fn kept_alive_connection_closes_once_idle() {
        let timeouts = TimeoutConfig {
            idle_secs: 1,
            ..TimeoutConfig::default()
        };
        let backend = HyperBackend::new(&LimitsConfig::default(), &timeouts);
        let (mut client, server) = duplex(64 * 1024);
        tokio::spawn(async move { backend.serve(server, ConnectionId::new()).await });

        client.write_all(b"GET /once HTTP/1.1\r\nHost: a\r\n\r\n").await.unwrap();
        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut out))
            .await
            .expect("idle keep-alive connection was not closed")
            .unwrap();

        let response = String::from_utf8(out).unwrap();
        assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 1);
        assert_eq!(document(&response).target, "/once");
    }

    #[test]
    fn version_labels() {
        assert_eq!(version_label(Version::HTTP_10), "1.0");
        assert_eq!(version_label(Version::HTTP_11), "1.1");
        assert_eq!(version_label(Version::HTTP_2), "2");
    }
}
