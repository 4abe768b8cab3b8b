//! Markdown loader.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{LoadError, LoadResult};
use crate::types::{DocumentFormat, LoadedDocument};
use crate::Loader;

/// Loads Markdown verbatim. Heading markers and emphasis survive into the
/// chunks; models handle them fine and they carry structure worth keeping.
#[derive(Debug, Clone, Default)]
pub struct MarkdownLoader;

impl MarkdownLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Loader for MarkdownLoader {
    async fn load(&self, path: &Path) -> LoadResult<LoadedDocument> {
        let bytes = tokio::fs::read(path).await?;
        let size_bytes = bytes.len();
        let text = String::from_utf8(bytes)
            .map_err(|_| LoadError::NotText(path.to_path_buf()))?;
        Ok(LoadedDocument::new(
            text,
            path.display().to_string(),
            DocumentFormat::Markdown,
            size_bytes,
        ))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn name(&self) -> &str {
        "markdown"
    }
}
