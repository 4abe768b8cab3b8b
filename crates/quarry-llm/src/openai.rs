//! OpenAI LLM provider implementation.

use async_trait::async_trait;

use quarry_core::error::{QuarryError, QuarryResult};
use quarry_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse};
#[cfg(feature = "openai")]
use quarry_core::traits::{ResponseFormat, TokenUsage};
use quarry_core::types::Message;

#[cfg(feature = "openai")]
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};

/// OpenAI LLM provider.
pub struct OpenAIProvider {
    #[cfg(feature = "openai")]
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAIProvider {
    /// Create a new OpenAI LLM provider.
    pub fn new(config: LlmConfig) -> QuarryResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                QuarryError::Configuration(
                    "OpenAI API key not found. Set OPENAI_API_KEY environment variable or provide api_key in config.".to_string(),
                )
            })?;

        #[cfg(feature = "openai")]
        let openai_config = if let Some(ref base_url) = config.base_url {
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(base_url)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        #[cfg(not(feature = "openai"))]
        let _ = api_key;

        #[cfg(feature = "openai")]
        let client = Client::with_config(openai_config);

        let mut config = config;
        if config.model.is_empty() {
            config.model = "gpt-4o-mini".to_string();
        }

        Ok(Self {
            #[cfg(feature = "openai")]
            client,
            config,
        })
    }

    /// Check if this is a reasoning model that rejects sampling params.
    fn is_reasoning_model(&self) -> bool {
        let model_lower = self.config.model.to_lowercase();
        ["o1", "o3", "gpt-5"]
            .iter()
            .any(|m| model_lower.contains(m))
    }

    #[cfg(feature = "openai")]
    fn message_to_openai(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            quarry_core::types::MessageRole::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            quarry_core::types::MessageRole::User => {
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            quarry_core::types::MessageRole::Assistant => {
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(
                        async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        ),
                    ),
                    name: None,
                    ..Default::default()
                })
            }
        }
    }
}

#[async_trait]
impl Llm for OpenAIProvider {
    #[cfg(feature = "openai")]
    async fn generate(
        &self,
        messages: &[Message],
        options: Option<GenerationOptions>,
    ) -> QuarryResult<LlmResponse> {
        let chat_messages: Vec<ChatCompletionRequestMessage> =
            messages.iter().map(Self::message_to_openai).collect();

        let options = options.unwrap_or_default();

        let mut request = CreateChatCompletionRequest {
            model: self.config.model.clone(),
            messages: chat_messages,
            ..Default::default()
        };

        // Only add temperature/top_p for non-reasoning models
        if !self.is_reasoning_model() {
            request.temperature = Some(options.temperature.unwrap_or(self.config.temperature));
            request.top_p = Some(options.top_p.unwrap_or(self.config.top_p));
            request.max_tokens = Some(options.max_tokens.unwrap_or(self.config.max_tokens));
        }

        if matches!(options.response_format, Some(ResponseFormat::Json)) {
            request.response_format = Some(OpenAIResponseFormat::JsonObject);
        }

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| QuarryError::llm(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| QuarryError::llm("No response choices returned"))?;

        let content = choice.message.content.clone();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(LlmResponse { content, usage })
    }

    #[cfg(not(feature = "openai"))]
    async fn generate(
        &self,
        _messages: &[Message],
        _options: Option<GenerationOptions>,
    ) -> QuarryResult<LlmResponse> {
        Err(QuarryError::Configuration(
            "OpenAI feature not enabled. Enable the 'openai' feature.".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}
