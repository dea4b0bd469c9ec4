//! Error types for pricedoc.
//!
//! Library crates use [`PriceDocError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only batch-level failures live here. Per-row problems (malformed rows,
//! failed numeric coercions) are recovered by the builder and reported
//! alongside the documents instead.

use std::path::PathBuf;

/// Top-level error type for all pricedoc operations.
#[derive(Debug, thiserror::Error)]
pub enum PriceDocError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The input source could not be opened or parsed at all.
    #[error("cannot read source {path:?}: {message}")]
    SourceRead { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad parameter, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// JSON serialization of documents failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PriceDocError>;

impl PriceDocError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a source-read error for the given input path.
    pub fn source_read(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SourceRead {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for PriceDocError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
