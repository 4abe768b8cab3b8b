//! quarry-core - Core library for quarry.
//!
//! This crate provides the types, traits, and engines for turning
//! unstructured documents into a knowledge graph: adaptive chunking,
//! concurrent LLM extraction, graph writing, and duplicate resolution.
//!
//! # Example
//!
//! ```ignore
//! use quarry_core::{split, ChunkProfile, ExtractionPipeline, GraphWriter, QuarryConfig};
//!
//! let config = QuarryConfig::from_env();
//! let profile = ChunkProfile::adaptive(text.len());
//! let chunks = split(&text, &profile, Some("report.pdf"))?;
//!
//! let pipeline = ExtractionPipeline::new(llm, config.extraction.clone());
//! let batch = pipeline.run(&chunks).await;
//!
//! let delta = quarry_core::merge(batch.results.iter().flatten());
//! let summary = GraphWriter::new(store).apply(&delta, false).await?;
//! ```

pub mod chunker;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod stats;
pub mod traits;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use chunker::{split, Chunk, ChunkProfile};
pub use config::{
    DedupConfig, ExtractionConfig, LlmProvider, LlmProviderConfig, QuarryConfig,
};
pub use dedup::{
    ApprovalPolicy, ApprovalRequest, AutoApprove, BackupHook, DuplicateDetector, DuplicateGroup,
    ExecutionOptions, ExecutionReport, PlanExecutor, ResolutionPlan, ResolutionPlanner,
};
pub use error::{ErrorCode, QuarryError, QuarryResult};
pub use extract::{merge, BatchResult, BatchSummary, ChunkExtractor, ExtractionPipeline};
pub use stats::GraphStatistics;
pub use traits::{
    GenerationOptions, GraphStore, GraphStoreConfig, GraphStoreProvider, Llm, LlmConfig,
    LlmResponse, ResponseFormat,
};
pub use types::{Entity, ExtractionResult, GraphDelta, Message, MessageRole, Relationship};
pub use writer::{GraphWriter, WriteSummary};
