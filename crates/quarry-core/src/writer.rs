//! Writing merged deltas into a graph store.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::QuarryResult;
use crate::traits::GraphStore;
use crate::types::{Entity, GraphDelta, Relationship};

/// Sanitize an entity type into a label-safe identifier.
///
/// Non-alphanumeric characters become `_`; a blank type falls back to
/// `Entity`.
pub fn sanitize_label(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "Entity".to_string();
    }
    raw.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Sanitize a relationship type: uppercase, spaces and hyphens to `_`,
/// other non-identifier characters dropped, blank falls back to
/// `RELATED_TO`.
pub fn sanitize_relationship_type(raw: &str) -> String {
    let sanitized: String = raw
        .to_uppercase()
        .chars()
        .filter_map(|c| match c {
            ' ' | '-' => Some('_'),
            c if c.is_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect();
    if sanitized.is_empty() {
        "RELATED_TO".to_string()
    } else {
        sanitized
    }
}

/// Counts for one write pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub entities_written: usize,
    pub entities_failed: usize,
    pub relationships_written: usize,
    /// Relationships skipped because an endpoint id is not in the delta.
    pub relationships_skipped: usize,
    pub relationships_failed: usize,
}

/// Writes a [`GraphDelta`] into a store with idempotent upserts.
///
/// Each write is individually atomic; a failure is logged and counted, and
/// the writer continues with the remaining items. Re-running the same delta
/// converges on the same graph.
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
}

impl GraphWriter {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Apply the delta. With `clear_existing` the store is wiped first;
    /// failing to wipe aborts before any write, since continuing would merge
    /// into stale data.
    pub async fn apply(&self, delta: &GraphDelta, clear_existing: bool) -> QuarryResult<WriteSummary> {
        if clear_existing {
            warn!("clearing existing graph before import");
            self.store.clear().await?;
        }

        let mut summary = WriteSummary::default();

        for entity in &delta.entities {
            let sanitized = Entity {
                entity_type: sanitize_label(&entity.entity_type),
                ..entity.clone()
            };
            match self.store.upsert_entity(&sanitized).await {
                Ok(()) => summary.entities_written += 1,
                Err(e) => {
                    error!(id = %entity.id, error = %e, "failed to write entity");
                    summary.entities_failed += 1;
                }
            }
        }

        let known_ids: HashSet<&str> = delta.entities.iter().map(|e| e.id.as_str()).collect();

        for relationship in &delta.relationships {
            if !known_ids.contains(relationship.source.as_str())
                || !known_ids.contains(relationship.target.as_str())
            {
                warn!(
                    source = %relationship.source,
                    target = %relationship.target,
                    "skipping relationship with unknown endpoint"
                );
                summary.relationships_skipped += 1;
                continue;
            }
            let sanitized = Relationship {
                relationship_type: sanitize_relationship_type(&relationship.relationship_type),
                ..relationship.clone()
            };
            match self.store.upsert_relationship(&sanitized).await {
                Ok(()) => summary.relationships_written += 1,
                Err(e) => {
                    error!(
                        source = %relationship.source,
                        target = %relationship.target,
                        error = %e,
                        "failed to write relationship"
                    );
                    summary.relationships_failed += 1;
                }
            }
        }

        info!(
            entities = summary.entities_written,
            relationships = summary.relationships_written,
            skipped = summary.relationships_skipped,
            failed = summary.entities_failed + summary.relationships_failed,
            "graph write finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuarryError;
    use crate::extract::{merge, parse::parse_extraction};
    use crate::traits::{GraphRow, LabelCount, PropertySummary, RelTypeCount, RelationshipPattern};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records upserts; can be told to fail specific entity ids.
    #[derive(Default)]
    struct RecordingStore {
        entities: Mutex<Vec<Entity>>,
        relationships: Mutex<Vec<Relationship>>,
        fail_entity_ids: Vec<String>,
        cleared: Mutex<bool>,
    }

    #[async_trait]
    impl GraphStore for RecordingStore {
        async fn ping(&self) -> QuarryResult<()> {
            Ok(())
        }

        async fn clear(&self) -> QuarryResult<()> {
            *self.cleared.lock().unwrap() = true;
            Ok(())
        }

        async fn upsert_entity(&self, entity: &Entity) -> QuarryResult<()> {
            if self.fail_entity_ids.contains(&entity.id) {
                return Err(QuarryError::graph_store("scripted write failure"));
            }
            self.entities.lock().unwrap().push(entity.clone());
            Ok(())
        }

        async fn upsert_relationship(&self, relationship: &Relationship) -> QuarryResult<()> {
            self.relationships.lock().unwrap().push(relationship.clone());
            Ok(())
        }

        async fn run(&self, _statement: &str) -> QuarryResult<Vec<GraphRow>> {
            Ok(vec![])
        }

        async fn node_labels(&self) -> QuarryResult<Vec<LabelCount>> {
            Ok(vec![])
        }

        async fn relationship_types(&self) -> QuarryResult<Vec<RelTypeCount>> {
            Ok(vec![])
        }

        async fn entities_with_label(
            &self,
            _label: &str,
            _limit: usize,
        ) -> QuarryResult<Vec<Entity>> {
            Ok(vec![])
        }

        async fn property_summary(
            &self,
            _label: &str,
        ) -> QuarryResult<BTreeMap<String, PropertySummary>> {
            Ok(BTreeMap::new())
        }

        async fn relationship_patterns(
            &self,
            _limit: usize,
        ) -> QuarryResult<Vec<RelationshipPattern>> {
            Ok(vec![])
        }

        async fn count_nodes(&self) -> QuarryResult<u64> {
            Ok(self.entities.lock().unwrap().len() as u64)
        }

        async fn count_relationships(&self) -> QuarryResult<u64> {
            Ok(self.relationships.lock().unwrap().len() as u64)
        }
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Person"), "Person");
        assert_eq!(sanitize_label("Police Officer"), "Police_Officer");
        assert_eq!(sanitize_label("multi-word type!"), "multi_word_type_");
        assert_eq!(sanitize_label(""), "Entity");
        assert_eq!(sanitize_label("   "), "Entity");
    }

    #[test]
    fn test_sanitize_relationship_type() {
        assert_eq!(sanitize_relationship_type("works for"), "WORKS_FOR");
        assert_eq!(sanitize_relationship_type("father-in-law"), "FATHER_IN_LAW");
        assert_eq!(sanitize_relationship_type("KNOWS"), "KNOWS");
        assert_eq!(sanitize_relationship_type("owns (partly)"), "OWNS_PARTLY");
        assert_eq!(sanitize_relationship_type(""), "RELATED_TO");
        assert_eq!(sanitize_relationship_type("!!!"), "RELATED_TO");
    }

    #[tokio::test]
    async fn test_relationship_with_unknown_endpoint_skipped() {
        let store = Arc::new(RecordingStore::default());
        let delta = GraphDelta {
            entities: vec![Entity::new("e1", "Person", "Elias")],
            relationships: vec![
                Relationship::new("e1", "KNOWS", "ghost"),
                Relationship::new("e1", "KNOWS", "e1"),
            ],
        };
        let summary = GraphWriter::new(store.clone()).apply(&delta, false).await.unwrap();
        assert_eq!(summary.relationships_skipped, 1);
        assert_eq!(summary.relationships_written, 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_counted_not_fatal() {
        let store = Arc::new(RecordingStore {
            fail_entity_ids: vec!["bad".to_string()],
            ..Default::default()
        });
        let delta = GraphDelta {
            entities: vec![
                Entity::new("bad", "Person", "Broken"),
                Entity::new("good", "Person", "Fine"),
            ],
            relationships: vec![],
        };
        let summary = GraphWriter::new(store.clone()).apply(&delta, false).await.unwrap();
        assert_eq!(summary.entities_failed, 1);
        assert_eq!(summary.entities_written, 1);
        assert_eq!(store.entities.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_existing_wipes_before_write() {
        let store = Arc::new(RecordingStore::default());
        let delta = GraphDelta::default();
        GraphWriter::new(store.clone()).apply(&delta, true).await.unwrap();
        assert!(*store.cleared.lock().unwrap());
    }

    /// One chunk describing Elias and Clara flows through parse, merge, and
    /// write: exactly two entity upserts and one relationship upsert.
    #[tokio::test]
    async fn test_two_person_story_writes_two_entities_one_relationship() {
        let response = r#"{
            "entities": [
                {"id": "elias", "type": "Person", "name": "Elias", "properties": {"trade": "clockmaker"}},
                {"id": "clara", "type": "Person", "name": "Clara"}
            ],
            "relationships": [
                {"source": "elias", "target": "clara", "type": "MENTORS"}
            ]
        }"#;
        let parsed = parse_extraction(response).unwrap();
        let delta = merge([&parsed]);

        let store = Arc::new(RecordingStore::default());
        let summary = GraphWriter::new(store.clone()).apply(&delta, false).await.unwrap();

        assert_eq!(summary.entities_written, 2);
        assert_eq!(summary.relationships_written, 1);
        assert_eq!(store.entities.lock().unwrap().len(), 2);
        let rels = store.relationships.lock().unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].triple(), ("elias", "MENTORS", "clara"));
    }
}
