//! Entity and relationship types for the knowledge graph.

use serde::{Deserialize, Serialize};

/// JSON property map attached to entities and relationships.
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// An entity extracted from text.
///
/// `id` is unique within one chunk's extraction result but may collide
/// across chunks when the same real-world entity is mentioned twice; the
/// merger resolves those collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub properties: PropertyMap,
}

impl Entity {
    pub fn new(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            name: name.into(),
            properties: PropertyMap::new(),
        }
    }

    /// Attach a property.
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// A directed relationship between two entities, referenced by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default, skip_serializing_if = "PropertyMap::is_empty")]
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(
        source: impl Into<String>,
        relationship_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship_type: relationship_type.into(),
            properties: PropertyMap::new(),
        }
    }

    /// The ordered dedup key: direction matters, properties do not.
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.source, &self.relationship_type, &self.target)
    }
}

/// What one chunk's extraction produced. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// The merged, deduplicated output of a whole batch.
///
/// Invariants: no two entities share an `id`; no two relationships share the
/// `(source, type, target)` triple.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDelta {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_builder() {
        let entity = Entity::new("e1", "Person", "Elias")
            .with_property("age", serde_json::json!(40));
        assert_eq!(entity.id, "e1");
        assert_eq!(entity.entity_type, "Person");
        assert_eq!(entity.properties["age"], serde_json::json!(40));
    }

    #[test]
    fn test_relationship_triple_is_ordered() {
        let forward = Relationship::new("a", "KNOWS", "b");
        let backward = Relationship::new("b", "KNOWS", "a");
        assert_ne!(forward.triple(), backward.triple());
    }

    #[test]
    fn test_entity_serde_uses_type_key() {
        let entity = Entity::new("e1", "Person", "Elias");
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "Person");
        assert!(json.get("entity_type").is_none());
    }
}
