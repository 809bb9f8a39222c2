//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the capture
//! server. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the capture server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CaptureConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Which HTTP implementation parses incoming requests.
    pub backend: BackendKind,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            max_connections: 10_000,
        }
    }
}

/// The HTTP implementation that parses requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// hyper 1.x via the hyper-util auto builder (HTTP/1.1 and h2c).
    #[default]
    Hyper,
    /// The in-crate HTTP/1.x connection driver on top of httparse.
    Wire,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Hyper => write!(f, "hyper"),
            BackendKind::Wire => write!(f, "wire"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hyper" => Ok(BackendKind::Hyper),
            "wire" => Ok(BackendKind::Wire),
            other => Err(format!("unknown backend `{}` (expected hyper or wire)", other)),
        }
    }
}

/// Request size limits.
///
/// The hyper backend only honors `max_body_bytes`; its head parsing limits are
/// the library's own.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of request line plus headers, and of a trailer section.
    pub max_head_bytes: usize,

    /// Maximum number of header fields in one request.
    pub max_headers: usize,

    /// Maximum decoded body size.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_headers: 128,
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a connection may wait for request bytes before it is dropped.
    pub idle_secs: u64,

    /// How long shutdown waits for open connections to finish.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 60,
            drain_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: CaptureConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:80");
        assert_eq!(config.backend, BackendKind::Hyper);
        assert_eq!(config.limits.max_headers, 128);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: CaptureConfig = toml::from_str(
            r#"
            backend = "wire"

            [limits]
            max_body_bytes = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Wire);
        assert_eq!(config.limits.max_body_bytes, 1024);
        assert_eq!(config.limits.max_head_bytes, 64 * 1024);
        assert_eq!(config.timeouts.idle_secs, 60);
    }

    #[test]
    fn backend_kind_parses_from_cli_text() {
        assert_eq!("wire".parse::<BackendKind>(), Ok(BackendKind::Wire));
        assert_eq!("hyper".parse::<BackendKind>(), Ok(BackendKind::Hyper));
        assert!("nginx".parse::<BackendKind>().is_err());
    }
}
