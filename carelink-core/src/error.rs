/// Structured error types for carelink-core.
///
/// Library consumers get composable `thiserror` errors; the CLI wraps
/// them with `anyhow` context.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for carelink-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Failed to parse config file {path:?}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// Required configuration value is missing or malformed
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Invalid timestamp format
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

/// Result type alias for carelink-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a config parse error
    pub fn config_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid timestamp error
    pub fn invalid_timestamp(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
