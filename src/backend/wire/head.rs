//! Request head parsing.
//!
//! The request line and header section are parsed by `httparse`. Everything it
//! accepts is copied out byte for byte; everything it rejects is a decode
//! failure. Header names are compared case-insensitively only to decide body
//! framing and connection reuse, never to alter what is captured.

use bytes::{Buf, Bytes, BytesMut};

use crate::backend::wire::Phase;
use crate::capture::{CaptureError, Limit};
use crate::capture::error::CaptureResult;
use crate::config::LimitsConfig;

/// How the message body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body at all.
    Empty,
    /// Exactly this many bytes follow the head.
    Length(u64),
    /// Chunked transfer coding.
    Chunked,
}

impl Framing {
    pub fn is_empty(&self) -> bool {
        matches!(self, Framing::Empty | Framing::Length(0))
    }
}

/// Outcome of one parse attempt over the connection buffer.
#[derive(Debug)]
pub enum HeadStatus {
    /// More bytes are needed; the parser got as far as this phase.
    Partial(Phase),
    /// The head is complete and was removed from the buffer.
    Complete(RequestHead),
}

/// A parsed request line and header section, as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Bytes,
    pub target: Bytes,
    pub version: Bytes,
    pub minor_version: u8,
    pub headers: Vec<(Bytes, Bytes)>,
}

impl RequestHead {
    fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, v)| &v[..])
    }

    fn tokens<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.values(name)
            .flat_map(|v| v.split(|b| *b == b','))
            .map(trim_ows)
    }

    /// Decide body framing from Transfer-Encoding and Content-Length.
    ///
    /// Ambiguous framing is rejected rather than resolved: both headers at
    /// once, a final coding other than chunked, chunked applied twice,
    /// Transfer-Encoding on HTTP/1.0, or disagreeing Content-Length values.
    pub fn framing(&self) -> CaptureResult<Framing> {
        let mut content_length: Option<u64> = None;
        for part in self.tokens("content-length") {
            let n = parse_decimal(part)
                .ok_or_else(|| CaptureError::Decode("invalid content-length".into()))?;
            match content_length {
                Some(prev) if prev != n => {
                    return Err(CaptureError::Decode("conflicting content-length values".into()));
                }
                _ => content_length = Some(n),
            }
        }

        if self.values("transfer-encoding").next().is_none() {
            return Ok(content_length.map_or(Framing::Empty, Framing::Length));
        }

        if content_length.is_some() {
            return Err(CaptureError::Decode(
                "both transfer-encoding and content-length present".into(),
            ));
        }
        if self.minor_version == 0 {
            return Err(CaptureError::Decode("transfer-encoding in HTTP/1.0 request".into()));
        }

        let codings: Vec<&[u8]> = self
            .tokens("transfer-encoding")
            .filter(|t| !t.is_empty())
            .collect();
        let chunked = codings
            .iter()
            .filter(|t| t.eq_ignore_ascii_case(b"chunked"))
            .count();
        match codings.last() {
            Some(last) if last.eq_ignore_ascii_case(b"chunked") && chunked == 1 => {
                Ok(Framing::Chunked)
            }
            _ => Err(CaptureError::Decode("final transfer-coding is not chunked".into())),
        }
    }

    /// Whether the connection may carry another request after this one.
    pub fn keep_alive(&self) -> bool {
        let mut close = false;
        let mut keep_alive = false;
        for token in self.tokens("connection") {
            close |= token.eq_ignore_ascii_case(b"close");
            keep_alive |= token.eq_ignore_ascii_case(b"keep-alive");
        }
        if close {
            false
        } else {
            self.minor_version >= 1 || keep_alive
        }
    }

    /// Whether the client waits for an interim 100 response before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.minor_version >= 1
            && self
                .values("expect")
                .any(|v| trim_ows(v).eq_ignore_ascii_case(b"100-continue"))
    }
}

/// Try to parse a request head from the front of `buf`.
///
/// On success the head bytes are consumed and any pipelined bytes stay in
/// the buffer.
pub fn parse_head(buf: &mut BytesMut, limits: &LimitsConfig) -> CaptureResult<HeadStatus> {
    let (len, head) = {
        let mut headers = vec![httparse::EMPTY_HEADER; limits.max_headers];
        let mut req = httparse::Request::new(&mut headers);
        match req.parse(&buf[..]) {
            Ok(httparse::Status::Complete(len)) => {
                if len > limits.max_head_bytes {
                    return Err(CaptureError::LimitExceeded {
                        limit: Limit::HeadBytes,
                        max: limits.max_head_bytes,
                    });
                }
                (len, head_from_parsed(&req)?)
            }
            Ok(httparse::Status::Partial) => {
                if buf.len() >= limits.max_head_bytes {
                    return Err(CaptureError::LimitExceeded {
                        limit: Limit::HeadBytes,
                        max: limits.max_head_bytes,
                    });
                }
                let phase = if req.version.is_some() {
                    Phase::AwaitingHeaders
                } else {
                    Phase::AwaitingRequestLine
                };
                return Ok(HeadStatus::Partial(phase));
            }
            Err(httparse::Error::TooManyHeaders) => {
                return Err(CaptureError::LimitExceeded {
                    limit: Limit::HeaderCount,
                    max: limits.max_headers,
                });
            }
            Err(httparse::Error::Token) if req.method.is_some() && req.path.is_none() => {
                return Err(CaptureError::TargetEncoding("invalid request-target".into()));
            }
            Err(e) => return Err(CaptureError::Decode(e.to_string())),
        }
    };

    buf.advance(len);
    Ok(HeadStatus::Complete(head))
}

fn head_from_parsed(req: &httparse::Request<'_, '_>) -> CaptureResult<RequestHead> {
    let (Some(method), Some(path), Some(minor_version)) = (req.method, req.path, req.version)
    else {
        return Err(CaptureError::Decode("incomplete request line".into()));
    };

    // httparse only accepts HTTP/1.0 and HTTP/1.1, so this is the literal token.
    let version = format!("HTTP/1.{}", minor_version);

    Ok(RequestHead {
        method: Bytes::copy_from_slice(method.as_bytes()),
        target: Bytes::copy_from_slice(path.as_bytes()),
        version: Bytes::from(version),
        minor_version,
        headers: req
            .headers
            .iter()
            .map(|h| {
                (
                    Bytes::copy_from_slice(h.name.as_bytes()),
                    Bytes::copy_from_slice(h.value),
                )
            })
            .collect(),
    })
}

fn trim_ows(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

fn parse_decimal(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })
}
