//! Graph inventory reporting.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::QuarryResult;
use crate::traits::{GraphStore, LabelCount, RelTypeCount};

/// Snapshot of the graph's label and relationship inventory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStatistics {
    pub node_labels: Vec<LabelCount>,
    pub relationship_types: Vec<RelTypeCount>,
    pub total_nodes: u64,
    pub total_relationships: u64,
}

impl GraphStatistics {
    /// Query the store for labels, relationship types, and totals.
    pub async fn collect(store: &dyn GraphStore) -> QuarryResult<Self> {
        Ok(Self {
            node_labels: store.node_labels().await?,
            relationship_types: store.relationship_types().await?,
            total_nodes: store.count_nodes().await?,
            total_relationships: store.count_relationships().await?,
        })
    }

    /// Human-readable inventory, labels and types ordered by count.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Graph statistics");
        let _ = writeln!(out, "================");
        let _ = writeln!(out, "Nodes: {}", self.total_nodes);

        let mut labels = self.node_labels.clone();
        labels.sort_by(|a, b| b.count.cmp(&a.count).then(a.label.cmp(&b.label)));
        for label in &labels {
            let _ = writeln!(out, "  {}: {}", label.label, label.count);
        }

        let _ = writeln!(out, "Relationships: {}", self.total_relationships);
        let mut types = self.relationship_types.clone();
        types.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.relationship_type.cmp(&b.relationship_type))
        });
        for rel_type in &types {
            let _ = writeln!(out, "  {}: {}", rel_type.relationship_type, rel_type.count);
        }
        out
    }
}
