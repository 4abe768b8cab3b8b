//! Graph store trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::QuarryResult;
use crate::types::{Entity, Relationship};

/// A row returned by a graph query, column name to JSON value.
pub type GraphRow = serde_json::Map<String, serde_json::Value>;

/// A node label with its node count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

/// A relationship type with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelTypeCount {
    pub relationship_type: String,
    pub count: u64,
}

/// A `source-[type]->target` label pattern with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub source_label: String,
    pub relationship_type: String,
    pub target_label: String,
    pub count: u64,
}

/// Summary of one property key across the entities of a label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertySummary {
    /// Up to five sample values.
    pub sample_values: Vec<serde_json::Value>,
    /// Number of entities carrying the property.
    pub entity_count: u64,
    /// Number of distinct values observed.
    pub unique_values: u64,
}

/// Core graph store trait - all graph backends implement this.
///
/// Upserts are individually atomic against the store; there is no
/// client-side transaction spanning a batch, so a batch import is
/// re-runnable.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Check connectivity with a cheap round-trip.
    async fn ping(&self) -> QuarryResult<()>;

    /// Remove every node and relationship. Destructive.
    async fn clear(&self) -> QuarryResult<()>;

    /// Upsert an entity keyed by `id` within its type-label partition.
    async fn upsert_entity(&self, entity: &Entity) -> QuarryResult<()>;

    /// Upsert a relationship keyed by `(source, type, target)`.
    ///
    /// A no-op when either endpoint node does not exist.
    async fn upsert_relationship(&self, relationship: &Relationship) -> QuarryResult<()>;

    /// Run an arbitrary statement in the store's query language and return
    /// row-like records.
    async fn run(&self, statement: &str) -> QuarryResult<Vec<GraphRow>>;

    /// All node labels with counts.
    async fn node_labels(&self) -> QuarryResult<Vec<LabelCount>>;

    /// All relationship types with counts.
    async fn relationship_types(&self) -> QuarryResult<Vec<RelTypeCount>>;

    /// Entities carrying the given label, capped at `limit`.
    async fn entities_with_label(&self, label: &str, limit: usize) -> QuarryResult<Vec<Entity>>;

    /// Per-property-key summary for the given label.
    async fn property_summary(&self, label: &str)
        -> QuarryResult<BTreeMap<String, PropertySummary>>;

    /// Label-to-label relationship patterns, most frequent first, capped at
    /// `limit`.
    async fn relationship_patterns(&self, limit: usize)
        -> QuarryResult<Vec<RelationshipPattern>>;

    /// Total node count.
    async fn count_nodes(&self) -> QuarryResult<u64>;

    /// Total relationship count.
    async fn count_relationships(&self) -> QuarryResult<u64>;
}

/// Graph store provider selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GraphStoreProvider {
    #[default]
    Neo4j,
    Memgraph,
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// Provider to use.
    #[serde(default)]
    pub provider: GraphStoreProvider,
    /// Connection URL.
    #[serde(default = "default_graph_url")]
    pub url: String,
    /// Username for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password for authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Database name (provider-specific).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

fn default_graph_url() -> String {
    "bolt://localhost:7687".to_string()
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            provider: GraphStoreProvider::default(),
            url: default_graph_url(),
            username: None,
            password: None,
            database: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphStoreConfig::default();
        assert_eq!(config.url, "bolt://localhost:7687");
        assert_eq!(config.provider, GraphStoreProvider::Neo4j);
        assert!(config.username.is_none());
    }
}
