//! Defensive parsing of LLM extraction responses.
//!
//! Local models wrap JSON in prose, emit trailing commas, and drift on key
//! names. Parsing is lenient on shape and strict on required fields: an
//! entity without an id and a relationship without both endpoints are
//! dropped rather than guessed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{QuarryError, QuarryResult};
use crate::types::{Entity, ExtractionResult, PropertyMap, Relationship};

static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([\]}])").unwrap());

/// Lenient wire shape for one extraction response.
#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default, alias = "nodes")]
    entities: Vec<RawEntity>,
    #[serde(default, alias = "edges", alias = "relations")]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type", alias = "entity_type", alias = "label")]
    entity_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    properties: PropertyMap,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    #[serde(default, alias = "from", alias = "start")]
    source: Option<String>,
    #[serde(default, alias = "to", alias = "end")]
    target: Option<String>,
    #[serde(default, rename = "type", alias = "relationship_type", alias = "relation")]
    relationship_type: Option<String>,
    #[serde(default)]
    properties: PropertyMap,
}

/// Cut the response down to the outermost JSON object.
pub(crate) fn isolate_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end >= start).then(|| &raw[start..=end])
}

/// Remove trailing commas before `]` and `}`. A no-op on valid JSON.
pub fn strip_trailing_commas(json: &str) -> String {
    TRAILING_COMMA_RE.replace_all(json, "$1").into_owned()
}

/// Parse an LLM extraction response into an [`ExtractionResult`].
///
/// Repair sequence: isolate the outer `{...}`, parse as-is, and on failure
/// strip trailing commas and parse once more. Anything still unparseable is
/// an error; the caller decides whether to retry the LLM call.
pub fn parse_extraction(raw: &str) -> QuarryResult<ExtractionResult> {
    let isolated = isolate_object(raw)
        .ok_or_else(|| QuarryError::parse("no JSON object found in extraction response"))?;

    let parsed: RawExtraction = match serde_json::from_str(isolated) {
        Ok(parsed) => parsed,
        Err(first_err) => {
            let repaired = strip_trailing_commas(isolated);
            serde_json::from_str(&repaired).map_err(|_| {
                QuarryError::parse(format!(
                    "extraction response is not valid JSON: {}",
                    first_err
                ))
            })?
        }
    };

    Ok(validate(parsed))
}

/// Required-field checks and defaults; never invents missing ids.
fn validate(raw: RawExtraction) -> ExtractionResult {
    let mut result = ExtractionResult::default();

    for entity in raw.entities {
        let Some(id) = entity.id.filter(|id| !id.is_empty()) else {
            debug!("dropping entity without id");
            continue;
        };
        let name = entity.name.filter(|n| !n.is_empty()).unwrap_or_else(|| id.clone());
        result.entities.push(Entity {
            entity_type: entity
                .entity_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Entity".to_string()),
            name,
            properties: entity.properties,
            id,
        });
    }

    for rel in raw.relationships {
        let (Some(source), Some(target)) = (
            rel.source.filter(|s| !s.is_empty()),
            rel.target.filter(|t| !t.is_empty()),
        ) else {
            debug!("dropping relationship without both endpoints");
            continue;
        };
        result.relationships.push(Relationship {
            source,
            target,
            relationship_type: rel
                .relationship_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "RELATED_TO".to_string()),
            properties: rel.properties,
        });
    }

    result
}
