//! Ollama LLM provider implementation.

use async_trait::async_trait;

use quarry_core::error::{QuarryError, QuarryResult};
use quarry_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse};
#[cfg(feature = "ollama")]
use quarry_core::traits::ResponseFormat;
use quarry_core::types::Message;
#[cfg(feature = "ollama")]
use quarry_core::types::MessageRole;

#[cfg(feature = "ollama")]
use ollama_rs::{
    generation::chat::request::ChatMessageRequest,
    generation::chat::{ChatMessage, MessageRole as OllamaRole},
    generation::options::GenerationOptions as OllamaOptions,
    Ollama,
};

/// Ollama LLM provider.
pub struct OllamaLlm {
    #[cfg(feature = "ollama")]
    client: Ollama,
    config: LlmConfig,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider.
    pub fn new(config: LlmConfig) -> QuarryResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        // Parse host and port from base_url
        let url = url::Url::parse(&base_url)
            .map_err(|e| QuarryError::Configuration(format!("Invalid Ollama URL: {}", e)))?;

        let host = url.host_str().unwrap_or("localhost").to_string();
        let port = url.port().unwrap_or(11434);

        #[cfg(feature = "ollama")]
        let client = Ollama::new(format!("http://{}", host), port);
        #[cfg(not(feature = "ollama"))]
        let _ = (host, port);

        let mut config = config;
        if config.model.is_empty() {
            config.model = "llama3.1:latest".to_string();
        }

        Ok(Self {
            #[cfg(feature = "ollama")]
            client,
            config,
        })
    }

    #[cfg(feature = "ollama")]
    fn message_to_ollama(msg: &Message) -> ChatMessage {
        ChatMessage {
            role: match msg.role {
                MessageRole::System => OllamaRole::System,
                MessageRole::User => OllamaRole::User,
                MessageRole::Assistant => OllamaRole::Assistant,
            },
            content: msg.content.clone(),
            images: None,
        }
    }
}

#[async_trait]
impl Llm for OllamaLlm {
    #[cfg(feature = "ollama")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> QuarryResult<LlmResponse> {
        let options = options.unwrap_or_default();

        let mut ollama_messages: Vec<ChatMessage> =
            messages.iter().map(Self::message_to_ollama).collect();

        // Ollama has no enforced JSON mode over chat; instruct instead.
        if matches!(options.response_format, Some(ResponseFormat::Json)) {
            if let Some(last) = ollama_messages.last_mut() {
                last.content
                    .push_str("\n\nPlease respond with valid JSON only.");
            }
        }

        let generation_options = OllamaOptions::default()
            .temperature(options.temperature.unwrap_or(self.config.temperature))
            .top_p(options.top_p.unwrap_or(self.config.top_p))
            .num_predict(options.max_tokens.unwrap_or(self.config.max_tokens) as i32);

        let request = ChatMessageRequest::new(self.config.model.clone(), ollama_messages)
            .options(generation_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| QuarryError::llm(format!("Ollama API error: {}", e)))?;

        let content = response.message.map(|m| m.content);

        Ok(LlmResponse {
            content,
            usage: None,
        })
    }

    #[cfg(not(feature = "ollama"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> QuarryResult<LlmResponse> {
        Err(QuarryError::Configuration(
            "Ollama feature not enabled. Enable the 'ollama' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        // Prompt-level only; responses still go through repair on parse.
        true
    }
}
