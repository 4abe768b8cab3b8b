//! Merging per-chunk extraction results into one deduplicated delta.

use std::collections::HashSet;

use tracing::debug;

use crate::types::{ExtractionResult, GraphDelta};

/// Merge per-chunk results, iterated in chunk-index order, into a
/// [`GraphDelta`].
///
/// First occurrence wins: the entity from the lowest chunk index keeps its
/// `id`, later entities with the same id are dropped without property
/// reconciliation. Relationships dedupe the same way on the ordered
/// `(source, type, target)` triple.
///
/// This assumes the model emits the same id for the same real-world entity
/// across chunks; when it does not, both survive as distinct nodes.
pub fn merge<'a>(results: impl IntoIterator<Item = &'a ExtractionResult>) -> GraphDelta {
    let mut delta = GraphDelta::default();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_triples: HashSet<(&str, &str, &str)> = HashSet::new();
    let mut dropped_entities = 0usize;
    let mut dropped_relationships = 0usize;

    let mut kept_entities = Vec::new();
    let mut kept_relationships = Vec::new();

    for result in results {
        for entity in &result.entities {
            if seen_ids.insert(&entity.id) {
                kept_entities.push(entity);
            } else {
                dropped_entities += 1;
            }
        }
        for relationship in &result.relationships {
            if seen_triples.insert(relationship.triple()) {
                kept_relationships.push(relationship);
            } else {
                dropped_relationships += 1;
            }
        }
    }

    delta.entities = kept_entities.into_iter().cloned().collect();
    delta.relationships = kept_relationships.into_iter().cloned().collect();

    if dropped_entities + dropped_relationships > 0 {
        debug!(
            dropped_entities,
            dropped_relationships, "dropped duplicates while merging"
        );
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Entity, Relationship};

    fn result(entities: Vec<Entity>, relationships: Vec<Relationship>) -> ExtractionResult {
        ExtractionResult {
            entities,
            relationships,
        }
    }

    #[test]
    fn test_first_occurrence_wins_per_id() {
        let chunk0 = result(vec![Entity::new("e1", "Person", "Elias Thorn")], vec![]);
        let chunk1 = result(vec![Entity::new("e1", "Person", "E. Thorn")], vec![]);
        let delta = merge([&chunk0, &chunk1]);
        assert_eq!(delta.entities.len(), 1);
        assert_eq!(delta.entities[0].name, "Elias Thorn");
    }

    #[test]
    fn test_distinct_ids_all_survive() {
        let chunk0 = result(vec![Entity::new("e1", "Person", "Elias")], vec![]);
        let chunk1 = result(vec![Entity::new("e2", "Person", "Clara")], vec![]);
        let delta = merge([&chunk0, &chunk1]);
        assert_eq!(delta.entities.len(), 2);
    }

    #[test]
    fn test_repeated_triple_survives_once() {
        let rel = Relationship::new("e1", "KNOWS", "e2");
        let chunk0 = result(vec![], vec![rel.clone()]);
        let chunk1 = result(vec![], vec![rel.clone()]);
        let chunk2 = result(vec![], vec![rel]);
        let delta = merge([&chunk0, &chunk1, &chunk2]);
        assert_eq!(delta.relationships.len(), 1);
    }

    #[test]
    fn test_direction_and_type_distinguish_triples() {
        let chunk = result(
            vec![],
            vec![
                Relationship::new("e1", "KNOWS", "e2"),
                Relationship::new("e2", "KNOWS", "e1"),
                Relationship::new("e1", "EMPLOYS", "e2"),
            ],
        );
        let delta = merge([&chunk]);
        assert_eq!(delta.relationships.len(), 3);
    }

    #[test]
    fn test_later_duplicate_properties_discarded() {
        let chunk0 = result(
            vec![Entity::new("e1", "Person", "Elias").with_property("age", serde_json::json!(40))],
            vec![],
        );
        let chunk1 = result(
            vec![Entity::new("e1", "Person", "Elias").with_property("city", serde_json::json!("Harborview"))],
            vec![],
        );
        let delta = merge([&chunk0, &chunk1]);
        assert!(delta.entities[0].properties.contains_key("age"));
        assert!(!delta.entities[0].properties.contains_key("city"));
    }

    #[test]
    fn test_empty_input_empty_delta() {
        let delta = merge(std::iter::empty::<&ExtractionResult>());
        assert!(delta.is_empty());
    }
}
