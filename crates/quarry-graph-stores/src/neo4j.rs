//! Neo4j graph store implementation over the Bolt protocol.
//!
//! Labels and relationship types cannot be query parameters in Cypher, so
//! they are sanitized and interpolated inside backticks. Property values
//! bind as parameters: scalars natively, arrays and objects as JSON strings.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use serde_json::Value;
use tracing::debug;

use quarry_core::error::{QuarryError, QuarryResult};
use quarry_core::traits::{
    GraphRow, GraphStore, GraphStoreConfig, LabelCount, PropertySummary, RelTypeCount,
    RelationshipPattern,
};
use quarry_core::types::{Entity, PropertyMap, Relationship};
use quarry_core::writer::{sanitize_label, sanitize_relationship_type};

/// Neo4j-backed graph store. Also serves Memgraph, which speaks Bolt.
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect using the given configuration.
    pub async fn connect(config: &GraphStoreConfig) -> QuarryResult<Self> {
        let user = config.username.as_deref().unwrap_or("neo4j");
        let password = config.password.as_deref().unwrap_or("");

        let mut builder = ConfigBuilder::default()
            .uri(&config.url)
            .user(user)
            .password(password);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let bolt_config = builder
            .build()
            .map_err(|e| QuarryError::Configuration(format!("Invalid graph config: {e}")))?;

        let graph = Graph::connect(bolt_config)
            .await
            .map_err(|e| QuarryError::graph_connection(format!("Connection failed: {e}")))?;

        Ok(Self { graph })
    }

    async fn collect_rows(&self, q: Query) -> QuarryResult<Vec<GraphRow>> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?
        {
            let value: Value = row
                .to::<Value>()
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            rows.push(match value {
                Value::Object(map) => map,
                other => {
                    let mut map = GraphRow::new();
                    map.insert("value".to_string(), other);
                    map
                }
            });
        }
        Ok(rows)
    }
}

/// Property keys go inside backticks; the only character that must not
/// appear there is the backtick itself.
fn escape_key(key: &str) -> String {
    key.replace('`', "")
}

/// Keys bound as explicit parameters on every entity node.
const RESERVED_KEYS: [&str; 2] = ["id", "name"];

fn settable_properties(properties: &PropertyMap) -> Vec<(&String, &Value)> {
    properties
        .iter()
        .filter(|(key, value)| !RESERVED_KEYS.contains(&key.as_str()) && !value.is_null())
        .collect()
}

fn upsert_entity_cypher(label: &str, keys: &[&String]) -> String {
    let mut cypher = format!("MERGE (n:`{label}` {{id: $id}})\nSET n.name = $name");
    for (i, key) in keys.iter().enumerate() {
        let _ = write!(cypher, ",\n    n.`{}` = $p{i}", escape_key(key));
    }
    cypher
}

fn upsert_relationship_cypher(rel_type: &str, keys: &[&String]) -> String {
    let mut cypher = format!(
        "MATCH (a {{id: $source}})\nMATCH (b {{id: $target}})\nMERGE (a)-[r:`{rel_type}`]->(b)"
    );
    for (i, key) in keys.iter().enumerate() {
        let prefix = if i == 0 { "\nSET " } else { ",\n    " };
        let _ = write!(cypher, "{prefix}r.`{}` = $p{i}", escape_key(key));
    }
    cypher
}

/// Bind a JSON value as a query parameter. Arrays and objects are stored as
/// JSON strings; Cypher has no parameter type for nested maps on SET.
fn bind_value(q: Query, name: &str, value: &Value) -> Query {
    match value {
        Value::Bool(b) => q.param(name, *b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.param(name, i)
            } else {
                q.param(name, n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => q.param(name, s.as_str()),
        other => q.param(name, other.to_string()),
    }
}

fn entity_from_row(label: &str, mut row: GraphRow) -> Option<Entity> {
    let id = match row.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return None,
    };
    let name = match row.get("name") {
        Some(Value::String(s)) => s.clone(),
        _ => id.clone(),
    };
    let mut properties = match row.remove("properties") {
        Some(Value::Object(map)) => map,
        _ => PropertyMap::new(),
    };
    for key in RESERVED_KEYS {
        properties.remove(key);
    }

    let mut entity = Entity::new(id, label, name);
    entity.properties = properties;
    Some(entity)
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ping(&self) -> QuarryResult<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| QuarryError::graph_connection(e.to_string()))
    }

    async fn clear(&self) -> QuarryResult<()> {
        self.graph
            .run(query("MATCH (n) DETACH DELETE n"))
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))
    }

    async fn upsert_entity(&self, entity: &Entity) -> QuarryResult<()> {
        let label = sanitize_label(&entity.entity_type);
        let settable = settable_properties(&entity.properties);
        let keys: Vec<&String> = settable.iter().map(|(key, _)| *key).collect();

        let cypher = upsert_entity_cypher(&label, &keys);
        let mut q = query(&cypher)
            .param("id", entity.id.as_str())
            .param("name", entity.name.as_str());
        for (i, (_, value)) in settable.iter().enumerate() {
            q = bind_value(q, &format!("p{i}"), value);
        }

        debug!(id = %entity.id, label = %label, "upserting entity");
        self.graph
            .run(q)
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))
    }

    async fn upsert_relationship(&self, relationship: &Relationship) -> QuarryResult<()> {
        let rel_type = sanitize_relationship_type(&relationship.relationship_type);
        let settable = settable_properties(&relationship.properties);
        let keys: Vec<&String> = settable.iter().map(|(key, _)| *key).collect();

        let cypher = upsert_relationship_cypher(&rel_type, &keys);
        let mut q = query(&cypher)
            .param("source", relationship.source.as_str())
            .param("target", relationship.target.as_str());
        for (i, (_, value)) in settable.iter().enumerate() {
            q = bind_value(q, &format!("p{i}"), value);
        }

        // When either endpoint is missing the MATCH yields nothing and the
        // MERGE never runs, which is the wanted no-op.
        self.graph
            .run(q)
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))
    }

    async fn run(&self, statement: &str) -> QuarryResult<Vec<GraphRow>> {
        self.collect_rows(query(statement)).await
    }

    async fn node_labels(&self) -> QuarryResult<Vec<LabelCount>> {
        let mut result = self
            .graph
            .execute(query(
                "MATCH (n) UNWIND labels(n) AS label \
                 RETURN label, count(*) AS count ORDER BY count DESC",
            ))
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?;

        let mut labels = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?
        {
            let label: String = row
                .get("label")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            let count: i64 = row
                .get("count")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            labels.push(LabelCount {
                label,
                count: count.max(0) as u64,
            });
        }
        Ok(labels)
    }

    async fn relationship_types(&self) -> QuarryResult<Vec<RelTypeCount>> {
        let mut result = self
            .graph
            .execute(query(
                "MATCH ()-[r]->() RETURN type(r) AS relationship_type, \
                 count(*) AS count ORDER BY count DESC",
            ))
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?;

        let mut types = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?
        {
            let relationship_type: String = row
                .get("relationship_type")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            let count: i64 = row
                .get("count")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            types.push(RelTypeCount {
                relationship_type,
                count: count.max(0) as u64,
            });
        }
        Ok(types)
    }

    async fn entities_with_label(&self, label: &str, limit: usize) -> QuarryResult<Vec<Entity>> {
        let safe_label = sanitize_label(label);
        let cypher = format!(
            "MATCH (n:`{safe_label}`) \
             RETURN n.id AS id, n.name AS name, properties(n) AS properties \
             LIMIT $limit"
        );
        let rows = self
            .collect_rows(query(&cypher).param("limit", limit as i64))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| entity_from_row(label, row))
            .collect())
    }

    async fn property_summary(
        &self,
        label: &str,
    ) -> QuarryResult<BTreeMap<String, PropertySummary>> {
        let safe_label = sanitize_label(label);
        let cypher = format!(
            "MATCH (n:`{safe_label}`) UNWIND keys(n) AS key \
             RETURN key, count(*) AS entity_count, \
             count(DISTINCT n[key]) AS unique_values, \
             collect(DISTINCT n[key])[0..5] AS sample_values \
             ORDER BY key"
        );
        let rows = self.collect_rows(query(&cypher)).await?;

        let mut summary = BTreeMap::new();
        for row in rows {
            let key = match row.get("key") {
                Some(Value::String(s)) => s.clone(),
                _ => continue,
            };
            let entity_count = row
                .get("entity_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let unique_values = row
                .get("unique_values")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let sample_values = match row.get("sample_values") {
                Some(Value::Array(values)) => values.clone(),
                _ => Vec::new(),
            };
            summary.insert(
                key,
                PropertySummary {
                    sample_values,
                    entity_count,
                    unique_values,
                },
            );
        }
        Ok(summary)
    }

    async fn relationship_patterns(
        &self,
        limit: usize,
    ) -> QuarryResult<Vec<RelationshipPattern>> {
        let mut result = self
            .graph
            .execute(
                query(
                    "MATCH (a)-[r]->(b) \
                     RETURN coalesce(head(labels(a)), 'None') AS source_label, \
                     type(r) AS relationship_type, \
                     coalesce(head(labels(b)), 'None') AS target_label, \
                     count(*) AS count \
                     ORDER BY count DESC LIMIT $limit",
                )
                .param("limit", limit as i64),
            )
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?;

        let mut patterns = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?
        {
            let source_label: String = row
                .get("source_label")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            let relationship_type: String = row
                .get("relationship_type")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            let target_label: String = row
                .get("target_label")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            let count: i64 = row
                .get("count")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            patterns.push(RelationshipPattern {
                source_label,
                relationship_type,
                target_label,
                count: count.max(0) as u64,
            });
        }
        Ok(patterns)
    }

    async fn count_nodes(&self) -> QuarryResult<u64> {
        let mut result = self
            .graph
            .execute(query("MATCH (n) RETURN count(n) AS count"))
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?;

        if let Some(row) = result
            .next()
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?
        {
            let count: i64 = row
                .get("count")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            Ok(count.max(0) as u64)
        } else {
            Ok(0)
        }
    }

    async fn count_relationships(&self) -> QuarryResult<u64> {
        let mut result = self
            .graph
            .execute(query("MATCH ()-[r]->() RETURN count(r) AS count"))
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?;

        if let Some(row) = result
            .next()
            .await
            .map_err(|e| QuarryError::graph_store(e.to_string()))?
        {
            let count: i64 = row
                .get("count")
                .map_err(|e| QuarryError::graph_store(e.to_string()))?;
            Ok(count.max(0) as u64)
        } else {
            Ok(0)
        }
    }
}
