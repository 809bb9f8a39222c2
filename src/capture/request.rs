//! The captured request: what a backend believes it received.

use bytes::Bytes;

use crate::capture::document::CaptureDocument;

/// A request exactly as one backend parsed it.
///
/// All fields are raw bytes. The capture layer never validates, trims or
/// case-folds them; whatever normalization is present was done by the backend
/// that produced the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedRequest {
    /// Method token as delivered.
    pub method: Bytes,
    /// Request target (path and optional query).
    pub target: Bytes,
    /// Protocol version as the backend reports it.
    pub version: Bytes,
    /// Header fields in arrival order, duplicates kept.
    pub headers: Vec<(Bytes, Bytes)>,
    /// Message body after transfer decoding.
    pub body: Bytes,
}

impl CapturedRequest {
    /// Start a capture from the request-line fields.
    pub fn new(
        method: impl Into<Bytes>,
        target: impl Into<Bytes>,
        version: impl Into<Bytes>,
    ) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            version: version.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append one header field after the ones already captured.
    pub fn push_header(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Attach the aggregated body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Encode into the canonical capture document.
    pub fn encode(&self) -> CaptureDocument {
        CaptureDocument::from_request(self)
    }

    /// Encode and serialize in one step.
    pub fn to_json(&self) -> Bytes {
        self.encode().to_json()
    }
}
