//! Shared error primitives for the devx workspace.
//!
//! Each higher-level crate defines its own domain-specific error enum and
//! wraps these common variants where appropriate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors shared by file-backed records across the workspace.
#[derive(Debug, Error)]
pub enum CommonError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error at {path}: {source}")]
    Json {
        /// Path of the offending document.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

/// Convenience alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, CommonError>;
