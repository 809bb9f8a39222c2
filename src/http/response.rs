//! Response construction.
//!
//! # Responsibilities
//! - Wrap a capture document in a 200 response
//! - Build the canonical failure response (4xx, empty body, connection close)
//!
//! Both backends share the same header set: `Content-Type: application/json`
//! and `Content-Length` on success, `Content-Length: 0` and
//! `Connection: close` on failure.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode, Version};

/// Interim response for `Expect: 100-continue`.
pub const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

const JSON: &str = "application/json";

/// Success response carrying a capture document (hyper backend).
pub fn capture_response(document: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(document));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    response
}

/// Failure response (hyper backend).
///
/// `Connection: close` makes hyper close the connection after writing it;
/// HTTP/2 has no such header, the stream is simply reset by the peer.
pub fn failure_response(status: StatusCode, version: Version) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    if version < Version::HTTP_2 {
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
    }
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

/// Serialized HTTP/1.1 success response (wire backend).
///
/// `head_only` omits the payload but keeps its Content-Length, as a response
/// to HEAD must.
pub fn encode_capture(document: &[u8], keep_alive: bool, head_only: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(document.len() + 128);
    out.extend_from_slice(&status_line(StatusCode::OK));
    out.extend_from_slice(format!("Content-Type: {}\r\n", JSON).as_bytes());
    out.extend_from_slice(format!("Content-Length: {}\r\n", document.len()).as_bytes());
    if !keep_alive {
        out.extend_from_slice(b"Connection: close\r\n");
    }
    out.extend_from_slice(b"\r\n");
    if !head_only {
        out.extend_from_slice(document);
    }
    out
}

/// Serialized HTTP/1.1 failure response (wire backend).
pub fn encode_failure(status: StatusCode) -> Vec<u8> {
    let mut out = status_line(status);
    out.extend_from_slice(b"Content-Length: 0\r\nConnection: close\r\n\r\n");
    out
}

fn status_line(status: StatusCode) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_head_and_body() {
        let raw = encode_capture(b"{}", true, false);
        assert_eq!(
            raw,
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}"
        );
    }

    #[test]
    fn success_without_keep_alive_announces_close() {
        let raw = String::from_utf8(encode_capture(b"{}", false, false)).unwrap();
        assert!(raw.contains("Connection: close\r\n"));
    }

    #[test]
    fn head_request_omits_payload() {
        let raw = encode_capture(b"{\"a\":1}", true, true);
        assert!(raw.ends_with(b"Content-Length: 7\r\n\r\n"));
    }

    #[test]
    fn failure_is_empty_and_closes() {
        assert_eq!(
            encode_failure(StatusCode::BAD_REQUEST),
            b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn hyper_failure_response_closes_http1_only() {
        let h1 = failure_response(StatusCode::BAD_REQUEST, Version::HTTP_11);
        assert_eq!(h1.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h1.headers()[CONNECTION], "close");

        let h2 = failure_response(StatusCode::BAD_REQUEST, Version::HTTP_2);
        assert!(h2.headers().get(CONNECTION).is_none());
    }

    #[test]
    fn hyper_capture_response_is_json() {
        let response = capture_response(Bytes::from_static(b"{}"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], JSON);
    }
}
