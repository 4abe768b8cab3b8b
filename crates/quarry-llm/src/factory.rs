//! Factory for creating LLM providers.

use std::sync::Arc;

use tracing::{info, warn};

use quarry_core::config::{LlmProvider, LlmProviderConfig};
use quarry_core::error::{ErrorCode, QuarryError, QuarryResult};
use quarry_core::traits::{GenerationOptions, Llm, LlmConfig};
use quarry_core::types::Message;

use crate::ollama::OllamaLlm;
use crate::openai::OpenAIProvider;

/// Factory for creating LLM providers.
pub struct LlmFactory;

impl LlmFactory {
    /// Create an LLM provider from the given configuration.
    pub fn create(provider: LlmProvider, config: LlmConfig) -> QuarryResult<Arc<dyn Llm>> {
        match provider {
            LlmProvider::Ollama => {
                let llm = OllamaLlm::new(config)?;
                Ok(Arc::new(llm))
            }
            LlmProvider::OpenAI => {
                let llm = OpenAIProvider::new(config)?;
                Ok(Arc::new(llm))
            }
        }
    }

    /// Create a provider from a combined provider + model configuration.
    pub fn from_config(provider_config: &LlmProviderConfig) -> QuarryResult<Arc<dyn Llm>> {
        Self::create(provider_config.provider, provider_config.config.clone())
    }

    /// Create an Ollama LLM provider with default configuration.
    pub fn ollama() -> QuarryResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::Ollama, LlmConfig::default())
    }

    /// Create an Ollama LLM provider with a specific model.
    pub fn ollama_with_model(model: impl Into<String>) -> QuarryResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::Ollama, config)
    }

    /// Create an OpenAI LLM provider with default configuration.
    pub fn openai() -> QuarryResult<Arc<dyn Llm>> {
        Self::create(LlmProvider::OpenAI, LlmConfig::default())
    }

    /// Create an OpenAI LLM provider with a specific model.
    pub fn openai_with_model(model: impl Into<String>) -> QuarryResult<Arc<dyn Llm>> {
        let config = LlmConfig {
            model: model.into(),
            ..Default::default()
        };
        Self::create(LlmProvider::OpenAI, config)
    }

    /// Connect to the first usable model.
    ///
    /// Candidates come from [`LlmConfig::model_candidates`]: the configured
    /// model first, then the fallbacks. Each is probed with a one-token
    /// generation; the first that answers wins. When none answer, the run
    /// cannot proceed and the error is fatal at setup time.
    pub async fn connect_with_fallbacks(
        provider_config: &LlmProviderConfig,
    ) -> QuarryResult<Arc<dyn Llm>> {
        let candidates = provider_config.config.model_candidates();
        for candidate in &candidates {
            let config = LlmConfig {
                model: candidate.clone(),
                ..provider_config.config.clone()
            };
            let llm = match Self::create(provider_config.provider, config) {
                Ok(llm) => llm,
                Err(e) => {
                    warn!(model = %candidate, error = %e, "provider setup failed");
                    continue;
                }
            };
            match probe(llm.as_ref()).await {
                Ok(()) => {
                    info!(model = %candidate, "connected");
                    return Ok(llm);
                }
                Err(e) => {
                    warn!(model = %candidate, error = %e, "model did not answer, trying next");
                }
            }
        }
        Err(QuarryError::Llm {
            message: format!(
                "no usable model among candidates: {}",
                candidates.join(", ")
            ),
            code: ErrorCode::LlmNoUsableModel,
            source: None,
        })
    }
}

/// One-token generation to verify the model actually answers.
async fn probe(llm: &dyn Llm) -> QuarryResult<()> {
    let messages = [Message::user("Hello")];
    let options = GenerationOptions {
        max_tokens: Some(1),
        ..Default::default()
    };
    llm.generate(&messages, Some(options)).await.map(|_| ())
}
