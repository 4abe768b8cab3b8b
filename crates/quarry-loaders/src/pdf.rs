//! PDF loader using pdf-extract.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{LoadError, LoadResult};
use crate::types::{DocumentFormat, LoadedDocument};
use crate::Loader;

/// Extracts text from PDF files, wrapping the synchronous pdf-extract
/// call in spawn_blocking to avoid stalling the async runtime.
#[derive(Debug, Clone)]
pub struct PdfLoader {
    /// Minimum extracted length to consider the PDF text-based. Shorter
    /// output usually means a scanned document with no text layer.
    min_text_length: usize,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            min_text_length: 10,
        }
    }
}

impl PdfLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_text_length(min_text_length: usize) -> Self {
        Self { min_text_length }
    }
}

#[async_trait]
impl Loader for PdfLoader {
    async fn load(&self, path: &Path) -> LoadResult<LoadedDocument> {
        let size_bytes = tokio::fs::metadata(path).await?.len() as usize;

        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
            .await?
            .map_err(|e| LoadError::Pdf(e.to_string()))?;

        if text.trim().len() < self.min_text_length {
            return Err(LoadError::Empty(path.to_path_buf()));
        }

        Ok(LoadedDocument::new(
            text,
            path.display().to_string(),
            DocumentFormat::Pdf,
            size_bytes,
        ))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn name(&self) -> &str {
        "pdf-extract"
    }
}
