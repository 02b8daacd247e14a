//! Error types shared across the cache, the analyzer and the viewer.
//!
//! Collaborator failures (I/O, network) are always recovered locally:
//! the store turns them into "no cache entry" and the scheduler turns them
//! into an `AnalysisResult` with `error` set.

use std::path::PathBuf;

/// Failures from the analysis cache
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The source image could not be stat'ed, so no cache key exists for it
    #[error("Cannot fingerprint file: {0}")]
    Fingerprint(#[source] std::io::Error),
    /// Reading or writing the backing file failed
    #[error("Cache file error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The in-memory map could not be serialized
    #[error("Cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures from the external analysis call
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("No API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("Failed to read image: {0}")]
    ReadImage(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Transport(String),
    #[error("Server returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
