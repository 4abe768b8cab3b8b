//! quarry-loaders - Document loaders for quarry ingestion.
//!
//! Turns files into text ready for chunking, routed by extension.
//!
//! # Features
//!
//! - `pdf` (default) - PDF text extraction via pdf-extract
//!
//! # Example
//!
//! ```ignore
//! use quarry_loaders::LoaderFactory;
//!
//! let doc = LoaderFactory::load(Path::new("report.pdf")).await?;
//! println!("{} bytes of text from {}", doc.text.len(), doc.source);
//! ```

mod error;
mod factory;
mod markdown;
mod text;
mod types;

#[cfg(feature = "pdf")]
mod pdf;

pub use error::{LoadError, LoadResult};
pub use factory::LoaderFactory;
pub use markdown::MarkdownLoader;
pub use text::TextLoader;
pub use types::{DocumentFormat, LoadedDocument};

#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;

use async_trait::async_trait;
use std::path::Path;

/// Core Loader trait - all document loaders implement this.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load the file at `path` into text.
    async fn load(&self, path: &Path) -> LoadResult<LoadedDocument>;

    /// File extensions this loader handles, lowercase without the dot.
    fn supported_extensions(&self) -> &[&str];

    /// Check whether this loader handles the given extension.
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .contains(&extension.to_lowercase().as_str())
    }

    /// Human-readable name for this loader.
    fn name(&self) -> &str;
}
