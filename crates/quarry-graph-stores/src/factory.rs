//! Factory for creating graph store backends.

use std::sync::Arc;

use quarry_core::error::QuarryResult;
use quarry_core::traits::{GraphStore, GraphStoreConfig, GraphStoreProvider};

#[cfg(not(feature = "neo4j"))]
use quarry_core::error::QuarryError;

/// Factory for creating graph store backends.
pub struct GraphStoreFactory;

impl GraphStoreFactory {
    /// Connect to the configured backend.
    pub async fn connect(config: &GraphStoreConfig) -> QuarryResult<Arc<dyn GraphStore>> {
        match config.provider {
            // Memgraph is Bolt-compatible; one backend serves both.
            GraphStoreProvider::Neo4j | GraphStoreProvider::Memgraph => {
                #[cfg(feature = "neo4j")]
                {
                    let store = crate::neo4j::Neo4jStore::connect(config).await?;
                    Ok(Arc::new(store))
                }
                #[cfg(not(feature = "neo4j"))]
                {
                    Err(QuarryError::Configuration(
                        "Bolt backend not enabled. Enable the 'neo4j' feature.".to_string(),
                    ))
                }
            }
        }
    }
}
