//! quarry-graph-stores - Graph database backends for quarry.
//!
//! # Supported Backends
//!
//! - **Neo4j** (feature: `neo4j`, default) - Bolt protocol via neo4rs
//! - **Memgraph** - Bolt-compatible, served by the same backend
//!
//! # Example
//!
//! ```ignore
//! use quarry_graph_stores::GraphStoreFactory;
//!
//! let store = GraphStoreFactory::connect(&config.graph_store).await?;
//! store.ping().await?;
//! ```

mod factory;

#[cfg(feature = "neo4j")]
mod neo4j;

pub use factory::GraphStoreFactory;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jStore;

// Re-export core types for convenience
pub use quarry_core::traits::{GraphRow, GraphStore, GraphStoreConfig, GraphStoreProvider};
