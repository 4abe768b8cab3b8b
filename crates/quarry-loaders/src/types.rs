//! Core types for document loading.

use serde::{Deserialize, Serialize};

/// Format of the original document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain text.
    #[default]
    Text,
    /// Markdown, loaded verbatim.
    Markdown,
    /// PDF document.
    Pdf,
}

/// A loaded document ready for chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedDocument {
    /// Extracted text.
    pub text: String,
    /// Display path of the source file.
    pub source: String,
    /// Original format.
    pub format: DocumentFormat,
    /// Size of the source file in bytes, used for adaptive chunk sizing.
    pub size_bytes: usize,
}

impl LoadedDocument {
    pub fn new(
        text: String,
        source: impl Into<String>,
        format: DocumentFormat,
        size_bytes: usize,
    ) -> Self {
        Self {
            text,
            source: source.into(),
            format,
            size_bytes,
        }
    }

    /// Whether any non-whitespace text was extracted.
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}
