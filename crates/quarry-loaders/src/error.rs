//! Loader error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a document.
#[derive(Error, Debug)]
pub enum LoadError {
    /// File does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// File exists but produced no usable text.
    #[error("No text extracted from {0}")]
    Empty(PathBuf),

    /// File is not valid UTF-8 text.
    #[error("Not UTF-8 text: {0}")]
    NotText(PathBuf),

    /// IO error while reading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDF-specific extraction error.
    #[cfg(feature = "pdf")]
    #[error("PDF extraction error: {0}")]
    Pdf(String),

    /// Task join error from spawn_blocking.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;
