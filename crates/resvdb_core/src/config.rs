//! Core configuration schema and loader.
//!
//! # Invariants
//! - Every field has a default, so an empty document is a valid config.
//! - `namespace` is validated before any store handle is built from it.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Longest namespace name accepted by the store.
pub const MAX_NAMESPACE_LEN: usize = 31;

const DEFAULT_NAMESPACE: &str = "pbs";

/// Settings shared by every entry point embedding the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Store namespace all entity tables live under.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// One of `trace|debug|info|warn|error`.
    #[serde(default = "default_level")]
    pub log_level: String,

    /// Absolute directory for rolling log files. Logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            log_level: default_level(),
            log_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidNamespace(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::InvalidNamespace(value) => write!(
                f,
                "namespace `{value}` must be 1..={MAX_NAMESPACE_LEN} characters of [A-Za-z0-9_-]"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidNamespace(_) => None,
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = !self.namespace.is_empty()
            && self.namespace.len() <= MAX_NAMESPACE_LEN
            && self
                .namespace
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
        if !valid {
            return Err(ConfigError::InvalidNamespace(self.namespace.clone()));
        }
        Ok(())
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_level() -> String {
    default_log_level().to_string()
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.namespace, "pbs");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn fields_override_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"namespace":"sched_a","log_level":"warn"}"#).unwrap();
        assert_eq!(config.namespace, "sched_a");
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn invalid_namespace_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"namespace":"a:b"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNamespace(_)));

        let err = CoreConfig::from_json_str(r#"{"namespace":""}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNamespace(_)));
    }

    #[test]
    fn malformed_document_is_parse_error() {
        assert!(matches!(
            CoreConfig::from_json_str("{namespace").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
