//! Body framing: Content-Length and chunked transfer coding.
//!
//! The decoder consumes bytes from the connection buffer as they arrive and
//! appends payload to a body buffer owned by the current request. Chunk
//! payloads are appended in arrival order; trailers are parsed so that a
//! malformed trailer section fails the request, then discarded.

use bytes::{Buf, Bytes, BytesMut};

use crate::backend::wire::head::Framing;
use crate::capture::{CaptureError, Limit};
use crate::capture::error::CaptureResult;
use crate::config::LimitsConfig;

/// Longest accepted chunk-size line, extensions included.
const MAX_CHUNK_LINE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data { remaining: u64 },
    DataEnd,
    Trailers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Length { remaining: u64 },
    Chunked(ChunkState),
}

/// Incremental body decoder for a single request.
#[derive(Debug)]
pub struct BodyDecoder {
    kind: Kind,
    body: BytesMut,
    max_body: usize,
    max_trailer_bytes: usize,
    max_trailers: usize,
}

impl BodyDecoder {
    /// Create a decoder for the given framing.
    ///
    /// A declared Content-Length above the body limit fails immediately.
    pub fn new(framing: Framing, limits: &LimitsConfig) -> CaptureResult<Self> {
        let kind = match framing {
            Framing::Empty => Kind::Length { remaining: 0 },
            Framing::Length(n) => {
                if n > limits.max_body_bytes as u64 {
                    return Err(body_limit(limits.max_body_bytes));
                }
                Kind::Length { remaining: n }
            }
            Framing::Chunked => Kind::Chunked(ChunkState::Size),
        };
        Ok(Self {
            kind,
            body: BytesMut::new(),
            max_body: limits.max_body_bytes,
            max_trailer_bytes: limits.max_head_bytes,
            max_trailers: limits.max_headers,
        })
    }

    /// Consume what is available in `buf`.
    ///
    /// Returns the complete body once the end of the message has been seen;
    /// bytes belonging to a following request are left in `buf`.
    pub fn decode(&mut self, buf: &mut BytesMut) -> CaptureResult<Option<Bytes>> {
        loop {
            match self.kind {
                Kind::Length { remaining } => {
                    let take = remaining.min(buf.len() as u64) as usize;
                    self.body.extend_from_slice(&buf[..take]);
                    buf.advance(take);
                    let remaining = remaining - take as u64;
                    self.kind = Kind::Length { remaining };
                    return Ok((remaining == 0).then(|| self.body.split().freeze()));
                }
                Kind::Chunked(ChunkState::Size) => {
                    let line_len = buf.iter().position(|b| *b == b'\n').map(|end| end + 1);
                    if line_len.unwrap_or(buf.len()) > MAX_CHUNK_LINE {
                        return Err(CaptureError::Decode("chunk size line too long".into()));
                    }
                    let Some(end) = line_len else {
                        return Ok(None);
                    };
                    let line = buf.split_to(end);
                    let size = parse_chunk_size(&line)?;
                    if size == 0 {
                        self.kind = Kind::Chunked(ChunkState::Trailers);
                    } else {
                        if size > (self.max_body - self.body.len()) as u64 {
                            return Err(body_limit(self.max_body));
                        }
                        self.kind = Kind::Chunked(ChunkState::Data { remaining: size });
                    }
                }
                Kind::Chunked(ChunkState::Data { remaining }) => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let take = remaining.min(buf.len() as u64) as usize;
                    self.body.extend_from_slice(&buf[..take]);
                    buf.advance(take);
                    let remaining = remaining - take as u64;
                    self.kind = Kind::Chunked(if remaining == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data { remaining }
                    });
                }
                Kind::Chunked(ChunkState::DataEnd) => {
                    match &buf[..] {
                        [] | [b'\r'] => return Ok(None),
                        [b'\r', b'\n', ..] => buf.advance(2),
                        _ => {
                            return Err(CaptureError::Decode("missing CRLF after chunk data".into()));
                        }
                    }
                    self.kind = Kind::Chunked(ChunkState::Size);
                }
                Kind::Chunked(ChunkState::Trailers) => {
                    let parsed = {
                        let mut trailers = vec![httparse::EMPTY_HEADER; self.max_trailers];
                        match httparse::parse_headers(&buf[..], &mut trailers) {
                            Ok(httparse::Status::Complete((len, _))) => Ok(Some(len)),
                            Ok(httparse::Status::Partial) => Ok(None),
                            Err(e) => Err(e),
                        }
                    };
                    match parsed {
                        Ok(Some(len)) => {
                            buf.advance(len);
                            return Ok(Some(self.body.split().freeze()));
                        }
                        Ok(None) => {
                            if buf.len() >= self.max_trailer_bytes {
                                return Err(CaptureError::LimitExceeded {
                                    limit: Limit::HeadBytes,
                                    max: self.max_trailer_bytes,
                                });
                            }
                            return Ok(None);
                        }
                        Err(httparse::Error::TooManyHeaders) => {
                            return Err(CaptureError::LimitExceeded {
                                limit: Limit::HeaderCount,
                                max: self.max_trailers,
                            });
                        }
                        Err(e) => {
                            return Err(CaptureError::Decode(format!("invalid trailer section: {}", e)));
                        }
                    }
                }
            }
        }
    }
}

fn body_limit(max: usize) -> CaptureError {
    CaptureError::LimitExceeded {
        limit: Limit::BodyBytes,
        max,
    }
}

/// Parse `chunk-size [ BWS ";" chunk-ext ] CRLF`.
fn parse_chunk_size(line: &[u8]) -> CaptureResult<u64> {
    let invalid = || CaptureError::Decode("invalid chunk size line".into());

    let line = line.strip_suffix(b"\r\n").ok_or_else(invalid)?;
    let digits = line.iter().take_while(|b| b.is_ascii_hexdigit()).count();
    if digits == 0 || digits > 16 {
        return Err(invalid());
    }

    let size = line[..digits].iter().fold(0u64, |acc, b| {
        // At most 16 hex digits, so this cannot overflow.
        (acc << 4) | u64::from(hex_value(*b))
    });

    let mut rest = &line[digits..];
    while let [b' ' | b'\t', tail @ ..] = rest {
        rest = tail;
    }
    match rest {
        [] => Ok(size),
        [b';', ext @ ..] if !ext.contains(&b'\r') => Ok(size),
        _ => Err(invalid()),
    }
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}
