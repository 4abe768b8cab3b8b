//! On-disk cache of per-chunk extraction results.
//!
//! Extraction is the expensive pass; caching it lets the graph be rebuilt,
//! re-merged, or re-written without re-running the LLM. The cache is a JSON
//! array aligned with chunk order; failed chunks are `null` so positions
//! survive the round-trip.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::QuarryResult;
use crate::types::ExtractionResult;

/// Cache file for `document` inside `cache_dir`: `<stem>.json`.
pub fn cache_path(cache_dir: &Path, document: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    cache_dir.join(format!("{stem}.json"))
}

/// Write the slot list to `path`, creating parent directories as needed.
pub fn save(path: &Path, results: &[Option<ExtractionResult>]) -> QuarryResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(results)?;
    fs::write(path, json)?;
    info!(path = %path.display(), chunks = results.len(), "extraction cache saved");
    Ok(())
}

/// Read a slot list previously written by [`save`].
pub fn load(path: &Path) -> QuarryResult<Vec<Option<ExtractionResult>>> {
    let json = fs::read_to_string(path)?;
    let results: Vec<Option<ExtractionResult>> = serde_json::from_str(&json)?;
    info!(path = %path.display(), chunks = results.len(), "extraction cache loaded");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, Relationship};

    #[test]
    fn test_round_trip_preserves_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("novel.json");

        let results = vec![
            Some(ExtractionResult {
                entities: vec![Entity::new("e1", "Person", "Elias")],
                relationships: vec![Relationship::new("e1", "KNOWS", "e2")],
            }),
            None,
            Some(ExtractionResult::default()),
        ];

        save(&path, &results).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].as_ref().unwrap().entities[0].name, "Elias");
        assert!(loaded[1].is_none());
        assert!(loaded[2].as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_cache_path_uses_document_stem() {
        let path = cache_path(Path::new("extracted_data"), Path::new("docs/novel.pdf"));
        assert_eq!(path, Path::new("extracted_data/novel.json"));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).is_err());
    }
}
