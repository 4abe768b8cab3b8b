//! Prompt templates and response parsing for duplicate detection and
//! resolution planning.

use serde::Deserialize;
use tracing::warn;

use crate::dedup::types::{Confidence, DuplicateGroup, DuplicateKind};
use crate::extract::parse::strip_trailing_commas;

// ============================================================================
// Detection Prompts
// ============================================================================

/// Prompt for finding duplicate entity-type labels.
pub fn label_duplicates_prompt(context: &str) -> String {
    format!(
        r#"You are a database architect reviewing a knowledge graph for duplicate entity types.

Current entity types with node counts and sample properties:
{context}

Identify groups of types that represent the same real-world concept: case variants, singular/plural forms, abbreviations, or synonyms.

Return ONLY a JSON array in this format:
[
  {{
    "duplicate_types": ["Person", "person", "People"],
    "reasoning": "Case variants and plural form of the same concept",
    "merge_recommendation": {{
      "keep_type": "Person",
      "property_handling": "Union of properties, most populous type wins conflicts",
      "relationship_handling": "Re-point all relationships to the kept type"
    }},
    "risks": "Low; property sets are compatible"
  }}
]

Rules:
- Only group types you are confident refer to the same concept.
- Each group needs at least two types.
- Prefer keeping the most populous type.
- Return [] if there are no duplicates."#
    )
}

/// Prompt for finding duplicate entities within one label.
pub fn entity_duplicates_prompt(label: &str, context: &str) -> String {
    format!(
        r#"You are reviewing a knowledge graph for duplicate {label} entities.

Entities (id, name, properties):
{context}

Identify groups of entities that are the same real-world {label}: name variants, misspellings, abbreviations, or the same name with compatible properties.

Return ONLY a JSON array in this format:
[
  {{
    "duplicate_ids": ["person_12", "person_84"],
    "duplicate_names": ["Elias Thorn", "E. Thorn"],
    "reasoning": "Abbreviated form of the same name with matching properties",
    "merge_recommendation": {{
      "keep_id": "person_12",
      "property_handling": "Union of properties, keep the fuller record on conflict"
    }},
    "confidence": "high"
  }}
]

Rules:
- Only group entities you are confident are the same individual.
- Each group needs at least two ids.
- Mark uncertain matches with "confidence": "low" rather than omitting them.
- Return [] if there are no duplicates."#
    )
}

/// Prompt asking for a full resolution plan over the given groups.
pub fn resolution_plan_prompt(groups_json: &str, graph_context: &str) -> String {
    format!(
        r#"You are a database engineer writing a safe merge plan for duplicates in a Neo4j knowledge graph.

Duplicate groups to resolve:
{groups_json}

Graph context:
{graph_context}

For each group produce pre-merge validation queries (read-only checks that the merge is safe), merge operations (mutating queries), and post-merge validation queries (read-only checks the merge succeeded).

Return ONLY a JSON object in this format:
{{
  "groups": [
    {{
      "group_id": "unique-id",
      "group_summary": "Merge person and Person labels",
      "items": ["person", "Person"],
      "merge_target": "Person",
      "impact_assessment": "Affects 42 nodes and 120 relationships"
    }}
  ],
  "resolution_plan": [
    {{
      "group_id": "unique-id",
      "pre_merge_validation": [
        {{"query": "MATCH (n:person) RETURN count(n) AS count", "description": "Count nodes to merge", "success_criteria": "count matches expectation"}}
      ],
      "merge_operations": [
        {{"query": "MATCH (n:person) SET n:Person REMOVE n:person", "description": "Relabel person to Person", "requires_confirmation": true}}
      ],
      "post_merge_validation": [
        {{"query": "MATCH (n:person) RETURN count(n) AS count", "description": "Old label is empty", "success_criteria": "count is 0"}}
      ]
    }}
  ]
}}

Rules:
- All queries are Cypher. Validation queries must be read-only.
- Every resolution_plan entry references a group_id from groups.
- Merge in small steps; one concern per operation.
- Mark every destructive operation with "requires_confirmation": true."#
    )
}

// ============================================================================
// Detection Response Parsing
// ============================================================================

/// Cut a response down to the outermost JSON array.
fn isolate_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (end >= start).then(|| &raw[start..=end])
}

fn parse_array<T: for<'de> Deserialize<'de>>(response: &str) -> Option<Vec<T>> {
    let isolated = isolate_array(response)?;
    match serde_json::from_str(isolated) {
        Ok(items) => Some(items),
        Err(_) => {
            let repaired = strip_trailing_commas(isolated);
            serde_json::from_str(&repaired).ok()
        }
    }
}

/// Parse type-duplicate groups from a detection response.
///
/// Defensive: ungrammatical output is discarded with a warning, groups with
/// fewer than two members are dropped.
pub fn parse_label_groups(response: &str) -> Vec<DuplicateGroup> {
    #[derive(Debug, Deserialize)]
    struct RawMerge {
        #[serde(default, alias = "keep")]
        keep_type: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct RawGroup {
        #[serde(default, alias = "types", alias = "duplicates")]
        duplicate_types: Vec<String>,
        #[serde(default)]
        reasoning: Option<String>,
        #[serde(default)]
        merge_recommendation: Option<RawMerge>,
        #[serde(default, alias = "risk")]
        risks: Option<String>,
    }

    let Some(raw_groups) = parse_array::<RawGroup>(response) else {
        warn!("discarding unparseable type duplicate response");
        return vec![];
    };

    raw_groups
        .into_iter()
        .filter_map(|raw| {
            if raw.duplicate_types.len() < 2 {
                warn!(members = raw.duplicate_types.len(), "dropping type group with fewer than two members");
                return None;
            }
            Some(DuplicateGroup {
                kind: DuplicateKind::EntityType,
                names: raw.duplicate_types.clone(),
                items: raw.duplicate_types,
                entity_type: None,
                reasoning: raw.reasoning.unwrap_or_default(),
                merge_target: raw.merge_recommendation.and_then(|m| m.keep_type),
                confidence: Confidence::Medium,
                risk: raw.risks,
            })
        })
        .collect()
}

/// Parse entity-duplicate groups for `label` from a detection response.
pub fn parse_entity_groups(response: &str, label: &str) -> Vec<DuplicateGroup> {
    #[derive(Debug, Deserialize)]
    struct RawMerge {
        #[serde(default, alias = "keep")]
        keep_id: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct RawGroup {
        #[serde(default, alias = "ids")]
        duplicate_ids: Vec<String>,
        #[serde(default, alias = "names")]
        duplicate_names: Vec<String>,
        #[serde(default)]
        reasoning: Option<String>,
        #[serde(default)]
        merge_recommendation: Option<RawMerge>,
        #[serde(default)]
        confidence: Option<String>,
    }

    let Some(raw_groups) = parse_array::<RawGroup>(response) else {
        warn!(label, "discarding unparseable entity duplicate response");
        return vec![];
    };

    raw_groups
        .into_iter()
        .filter_map(|raw| {
            if raw.duplicate_ids.len() < 2 {
                warn!(members = raw.duplicate_ids.len(), "dropping entity group with fewer than two members");
                return None;
            }
            Some(DuplicateGroup {
                kind: DuplicateKind::Entity,
                items: raw.duplicate_ids,
                names: raw.duplicate_names,
                entity_type: Some(label.to_string()),
                reasoning: raw.reasoning.unwrap_or_default(),
                merge_target: raw.merge_recommendation.and_then(|m| m.keep_id),
                confidence: raw.confidence.as_deref().map(Confidence::parse).unwrap_or_default(),
                risk: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_groups_clean() {
        let response = r#"[
            {"duplicate_types": ["Person", "person"],
             "reasoning": "case variants",
             "merge_recommendation": {"keep_type": "Person"},
             "risks": "low"}
        ]"#;
        let groups = parse_label_groups(response);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].items, vec!["Person", "person"]);
        assert_eq!(groups[0].merge_target.as_deref(), Some("Person"));
        assert_eq!(groups[0].kind, DuplicateKind::EntityType);
    }

    #[test]
    fn test_parse_label_groups_with_prose_and_trailing_commas() {
        let response = r#"Here are the duplicates I found:
[
  {"duplicate_types": ["Car", "Cars",], "reasoning": "plural",},
]
Hope this helps!"#;
        let groups = parse_label_groups(response);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].items, vec!["Car", "Cars"]);
    }

    #[test]
    fn test_singleton_group_dropped() {
        let response = r#"[{"duplicate_types": ["Person"], "reasoning": "alone"}]"#;
        assert!(parse_label_groups(response).is_empty());
    }

    #[test]
    fn test_garbage_yields_no_groups() {
        assert!(parse_label_groups("no duplicates here").is_empty());
        assert!(parse_label_groups("[not json").is_empty());
    }

    #[test]
    fn test_parse_entity_groups_attaches_label_and_confidence() {
        let response = r#"[
            {"duplicate_ids": ["p1", "p2"],
             "duplicate_names": ["Elias", "E. Thorn"],
             "reasoning": "same person",
             "merge_recommendation": {"keep_id": "p1"},
             "confidence": "high"}
        ]"#;
        let groups = parse_entity_groups(response, "Person");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entity_type.as_deref(), Some("Person"));
        assert_eq!(groups[0].confidence, Confidence::High);
        assert_eq!(groups[0].merge_target.as_deref(), Some("p1"));
    }

    #[test]
    fn test_prompts_embed_context() {
        assert!(label_duplicates_prompt("Person: 12").contains("Person: 12"));
        assert!(entity_duplicates_prompt("Person", "p1 Elias").contains("p1 Elias"));
        let plan = resolution_plan_prompt("[groups]", "labels");
        assert!(plan.contains("[groups]"));
        assert!(plan.contains("resolution_plan"));
    }
}
