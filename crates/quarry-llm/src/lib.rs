//! quarry-llm - LLM provider implementations for quarry.
//!
//! # Supported Providers
//!
//! - **Ollama** (feature: `ollama`, default) - Local models via Ollama
//! - **OpenAI** (feature: `openai`) - GPT-4 family and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use quarry_llm::LlmFactory;
//!
//! // Create an Ollama LLM against a local daemon
//! let llm = LlmFactory::ollama()?;
//!
//! // Or probe the configured model and its fallbacks, keeping the
//! // first one that answers
//! let llm = LlmFactory::connect_with_fallbacks(&config.llm).await?;
//! ```

mod factory;
mod ollama;
mod openai;

pub use factory::LlmFactory;
pub use ollama::OllamaLlm;
pub use openai::OpenAIProvider;

// Re-export core types for convenience
pub use quarry_core::config::{LlmProvider, LlmProviderConfig};
pub use quarry_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
