//! Plain text loader.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{LoadError, LoadResult};
use crate::types::{DocumentFormat, LoadedDocument};
use crate::Loader;

/// Loads UTF-8 text files verbatim. Also the fallback for unknown
/// extensions.
#[derive(Debug, Clone, Default)]
pub struct TextLoader;

impl TextLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Loader for TextLoader {
    async fn load(&self, path: &Path) -> LoadResult<LoadedDocument> {
        let bytes = tokio::fs::read(path).await?;
        let size_bytes = bytes.len();
        let text = String::from_utf8(bytes)
            .map_err(|_| LoadError::NotText(path.to_path_buf()))?;
        Ok(LoadedDocument::new(
            text,
            path.display().to_string(),
            DocumentFormat::Text,
            size_bytes,
        ))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt"]
    }

    fn name(&self) -> &str {
        "text"
    }
}
