//! Factory routing paths to loaders by extension.

use std::path::Path;

use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::markdown::MarkdownLoader;
use crate::text::TextLoader;
use crate::types::LoadedDocument;
use crate::Loader;

#[cfg(feature = "pdf")]
use crate::pdf::PdfLoader;

/// Factory for picking the right loader for a file.
pub struct LoaderFactory;

impl LoaderFactory {
    /// The loader for the given path, chosen by extension. Unknown
    /// extensions fall back to plain text.
    pub fn for_path(path: &Path) -> Box<dyn Loader> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "md" | "markdown" => Box::new(MarkdownLoader::new()),
            #[cfg(feature = "pdf")]
            "pdf" => Box::new(PdfLoader::new()),
            "txt" => Box::new(TextLoader::new()),
            other => {
                debug!(extension = other, "unknown extension, treating as text");
                Box::new(TextLoader::new())
            }
        }
    }

    /// Load a document, routing by extension. Missing files are a typed
    /// error so callers can distinguish them from parse failures.
    pub async fn load(path: &Path) -> LoadResult<LoadedDocument> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        LoaderFactory::for_path(path).load(path).await
    }
}
