//! Error types for loading and decoding coverage reports.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur before any presenter runs.
#[derive(Debug, Error)]
pub enum CoverageError {
    /// The report could not be read from disk.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The content is not well-formed XML.
    #[error("malformed coverage document at byte {position}: {message}")]
    MalformedDocument { position: usize, message: String },

    /// Well-formed XML without the expected Clover structure.
    #[error("unsupported coverage report: {0}")]
    Schema(String),
}

/// Convenience alias for results with [`CoverageError`].
pub type Result<T> = std::result::Result<T, CoverageError>;
