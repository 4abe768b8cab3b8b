//! Core traits for quarry components.

pub mod graph_store;
pub mod llm;

pub use graph_store::{
    GraphRow, GraphStore, GraphStoreConfig, GraphStoreProvider, LabelCount, PropertySummary,
    RelTypeCount, RelationshipPattern,
};
pub use llm::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat, TokenUsage};
