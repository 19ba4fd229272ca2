//! Error types for trace recording.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for tracer operations.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors surfaced while opening, writing, or loading traces.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Trace file I/O failed.
    #[error("trace file {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Trace events could not be encoded or decoded.
    #[error("trace serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TraceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
