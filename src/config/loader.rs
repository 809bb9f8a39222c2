//! Resolving the effective configuration.
//!
//! A TOML file (or the built-in defaults) is read first, command-line
//! overrides are layered on top, and the result is validated once as a whole
//! so an override can never bypass validation.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{BackendKind, CaptureConfig};
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Values given on the command line, applied after the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub backend: Option<BackendKind>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut CaptureConfig) {
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
    }
}

/// Build the configuration the server will run with.
pub fn resolve_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<CaptureConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => CaptureConfig::default(),
    };
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CaptureConfig, ConfigError> {
    resolve_config(Some(path), ConfigOverrides::default())
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CaptureConfig, ConfigError> {
    let config: CaptureConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<CaptureConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}
