//! Document chunking with overlapping sliding windows.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, QuarryError, QuarryResult};

/// An ordered segment of a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the original document, starting at 0.
    pub index: usize,
    pub text: String,
    /// Source document identifier, usually the file path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Characters shared with the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn size(&self) -> usize {
        self.text.chars().count()
    }
}

/// Window size and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProfile {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkProfile {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

impl ChunkProfile {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Pick a window size from the document's byte length.
    ///
    /// Larger documents get larger windows so the chunk count, and with it
    /// the number of LLM calls, grows sublinearly.
    pub fn adaptive(document_bytes: usize) -> Self {
        let kb = document_bytes / 1024;
        if kb < 500 {
            Self::new(800, 100)
        } else if kb < 1000 {
            Self::new(1200, 150)
        } else if kb < 5000 {
            Self::new(1800, 200)
        } else {
            Self::new(2500, 300)
        }
    }
}

/// Split `text` into overlapping windows of `profile.chunk_size` characters.
///
/// The window steps by `chunk_size - overlap`; the last window ends exactly
/// at the end of the text and iteration stops there, so no zero-length chunk
/// and no chunk fully contained in its predecessor is produced. Windows are
/// measured in characters, never splitting a UTF-8 code point.
pub fn split(text: &str, profile: &ChunkProfile, source: Option<&str>) -> QuarryResult<Vec<Chunk>> {
    if profile.chunk_size == 0 {
        return Err(QuarryError::chunking(
            "chunk_size must be greater than zero",
            ErrorCode::ChunkSizeZero,
        ));
    }
    if profile.overlap >= profile.chunk_size {
        return Err(QuarryError::chunking(
            format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                profile.overlap, profile.chunk_size
            ),
            ErrorCode::ChunkOverlapTooLarge,
        ));
    }

    // Byte offset of every char boundary, with the text length as sentinel.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let n_chars = boundaries.len() - 1;

    let step = profile.chunk_size - profile.overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < n_chars {
        let end = (start + profile.chunk_size).min(n_chars);
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[boundaries[start]..boundaries[end]].to_string(),
            source: source.map(String::from),
            overlap: if chunks.is_empty() {
                0
            } else {
                profile.overlap
            },
        });
        if end == n_chars {
            break;
        }
        start += step;
    }

    Ok(chunks)
}
