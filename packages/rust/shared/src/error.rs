//! Error types for akdata.
//!
//! Library crates use [`AkDataError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all akdata operations.
#[derive(Debug, thiserror::Error)]
pub enum AkDataError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// JSON or story-script parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A primary input root does not exist.
    #[error("source not found: {path:?}")]
    MissingSource { path: PathBuf },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad limits, unserializable output, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AkDataError>;

impl AkDataError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Report an absent primary input directory.
    pub fn missing_source(path: impl Into<PathBuf>) -> Self {
        Self::MissingSource { path: path.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AkDataError::config("bundle_size_mb must be positive");
        assert_eq!(err.to_string(), "config error: bundle_size_mb must be positive");

        let err = AkDataError::missing_source("/nope/gamedata");
        assert!(err.to_string().contains("/nope/gamedata"));
    }
}
