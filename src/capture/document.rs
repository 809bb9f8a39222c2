//! The canonical capture document.
//!
//! Wire shape (compact, keys always in this order):
//!
//! ```text
//! {"method":"<b64>","uri":"<b64>","version":"<b64>","headers":[["<b64>","<b64>"],...],"body":"<b64>"}
//! ```
//!
//! Base64 uses the standard RFC 4648 alphabet with padding and no line
//! wrapping, so any byte sequence embeds without JSON escaping.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::request::CapturedRequest;

/// Errors from reading a capture document back.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Not JSON, or not the expected object shape.
    #[error("malformed capture document: {0}")]
    Json(#[from] serde_json::Error),

    /// A field did not hold valid standard base64.
    #[error("field `{field}` is not valid base64: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}

/// Base64-encoded view of a [`CapturedRequest`].
///
/// Field declaration order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDocument {
    pub method: String,
    pub uri: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CaptureDocument {
    /// Encode every field of a captured request.
    pub fn from_request(req: &CapturedRequest) -> Self {
        Self {
            method: STANDARD.encode(&req.method),
            uri: STANDARD.encode(&req.target),
            version: STANDARD.encode(&req.version),
            headers: req
                .headers
                .iter()
                .map(|(name, value)| (STANDARD.encode(name), STANDARD.encode(value)))
                .collect(),
            body: STANDARD.encode(&req.body),
        }
    }

    /// Serialize as compact JSON.
    pub fn to_json(&self) -> Bytes {
        // Strings and string pairs always serialize.
        serde_json::to_vec(self).map(Bytes::from).unwrap_or_default()
    }

    /// Parse a document from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, DocumentError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Decode back into raw bytes.
    pub fn decode(&self) -> Result<CapturedRequest, DocumentError> {
        let mut req = CapturedRequest::new(
            decode_field("method", &self.method)?,
            decode_field("uri", &self.uri)?,
            decode_field("version", &self.version)?,
        );
        for (name, value) in &self.headers {
            req.push_header(decode_field("headers", name)?, decode_field("headers", value)?);
        }
        Ok(req.with_body(decode_field("body", &self.body)?))
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, DocumentError> {
    STANDARD
        .decode(value)
        .map_err(|source| DocumentError::Base64 { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CapturedRequest {
        let mut req = CapturedRequest::new("GET", "/", "HTTP/1.1");
        req.push_header("A", "1");
        req.push_header("b", "2");
        req.push_header("A", "3");
        req
    }

    #[test]
    fn serializes_keys_in_fixed_order() {
        let json = CapturedRequest::new("GET", "/", "HTTP/1.1").to_json();
        assert_eq!(
            &json[..],
            br#"{"method":"R0VU","uri":"Lw==","version":"SFRUUC8xLjE=","headers":[],"body":""}"#
        );
    }

    #[test]
    fn duplicate_headers_stay_in_wire_order() {
        let doc = sample().encode();
        let expected: Vec<(String, String)> = vec![
            ("QQ==".into(), "MQ==".into()),
            ("Yg==".into(), "Mg==".into()),
            ("QQ==".into(), "Mw==".into()),
        ];
        assert_eq!(doc.headers, expected);

        let json = String::from_utf8(doc.to_json().to_vec()).unwrap();
        assert!(json.contains(r#""headers":[["QQ==","MQ=="],["Yg==","Mg=="],["QQ==","Mw=="]]"#));
    }

    #[test]
    fn unknown_method_token_is_plain_data() {
        let doc = CapturedRequest::new("FROB", "/", "HTTP/1.1").encode();
        assert_eq!(doc.method, "RlJPQg==");
    }

    #[test]
    fn query_string_is_kept_verbatim() {
        let doc = CapturedRequest::new("GET", "/path?x=1&y=2", "HTTP/1.1").encode();
        assert_eq!(doc.uri, STANDARD.encode(b"/path?x=1&y=2"));
    }

    #[test]
    fn empty_body_is_empty_string() {
        let json = CapturedRequest::new("GET", "/", "HTTP/1.1").to_json();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["body"], serde_json::json!(""));
    }

    #[test]
    fn arbitrary_bytes_survive_decode() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let mut req = CapturedRequest::new(&b"G\x00T"[..], &b"/\xff\r\n"[..], &b"HTTP/9\x7f"[..])
            .with_body(raw.clone());
        req.push_header(&b"X-\x80"[..], &b"\x01\x02 \t"[..]);

        let doc = CaptureDocument::from_json(&req.to_json()).unwrap();
        assert_eq!(doc.decode().unwrap(), req);
    }

    #[test]
    fn method_change_leaves_other_fields_alone() {
        let get = sample().with_body("payload").encode();
        let mut post = sample().with_body("payload");
        post.method = Bytes::from_static(b"POST");
        let post = post.encode();

        assert_ne!(get.method, post.method);
        assert_eq!(get.headers, post.headers);
        assert_eq!(get.body, post.body);
        assert_eq!(get.uri, post.uri);
    }

    #[test]
    fn rejects_missing_keys() {
        let err = CaptureDocument::from_json(br#"{"method":"R0VU","uri":"Lw=="}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn rejects_bad_base64() {
        let doc = CaptureDocument::from_json(
            br#"{"method":"R0VU","uri":"Lw==","version":"","headers":[],"body":"***"}"#,
        )
        .unwrap();
        match doc.decode() {
            Err(DocumentError::Base64 { field, .. }) => assert_eq!(field, "body"),
            other => panic!("expected base64 error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_three_element_header_pairs() {
        let err = CaptureDocument::from_json(
            br#"{"method":"","uri":"","version":"","headers":[["QQ==","MQ==","MQ=="]],"body":""}"#,
        );
        assert!(err.is_err());
    }
}
