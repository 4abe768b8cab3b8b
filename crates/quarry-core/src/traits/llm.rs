//! LLM trait and related types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QuarryResult;
use crate::types::Message;

/// Response from LLM generation.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Generated text content.
    pub content: Option<String>,
    /// Token usage statistics.
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    /// Get the content or an empty string.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Total tokens.
    pub total_tokens: u32,
}

/// Configuration options for LLM generation.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Top-p nucleus sampling.
    pub top_p: Option<f32>,
    /// Response format.
    pub response_format: Option<ResponseFormat>,
}

/// Response format for LLM output.
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    /// Plain text response.
    Text,
    /// JSON object response.
    Json,
}

/// Core LLM trait - all LLM providers implement this.
///
/// Callers needing a hard deadline wrap `generate` in a timeout and drop the
/// future on expiry; the remote service may keep computing until its own
/// timeout fires, so a dropped call frees local resources only.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Generate a response from the LLM.
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> QuarryResult<LlmResponse>;

    /// Get the model name.
    fn model_name(&self) -> &str;

    /// Check if this model supports JSON mode.
    fn supports_json_mode(&self) -> bool {
        true
    }
}

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Top-p nucleus sampling.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// API key (if not using environment variable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL for API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Models to try, in order, when the configured model is unavailable.
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
}

fn default_model() -> String {
    "llama3.1:latest".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_top_p() -> f32 {
    0.1
}

fn default_fallback_models() -> Vec<String> {
    vec![
        "gemma3:12b".to_string(),
        "gemma3:4b".to_string(),
        "llama3.1:latest".to_string(),
        "deepseek-r1:8b".to_string(),
    ]
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            api_key: None,
            base_url: None,
            fallback_models: default_fallback_models(),
        }
    }
}

impl LlmConfig {
    /// The sequence of model candidates to probe: the configured model first,
    /// then the fallbacks, deduplicated in order.
    pub fn model_candidates(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        std::iter::once(self.model.clone())
            .chain(self.fallback_models.iter().cloned())
            .filter(|m| !m.is_empty() && seen.insert(m.clone()))
            .collect()
    }
}
