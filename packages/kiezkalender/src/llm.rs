//! [`LanguageModel`] implementation backed by the OpenAI-compatible chat API.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use llm_client::{ChatRequest, ChatResponse, LlmClient, LlmError, Message};
use tracing::warn;

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::traits::{Completion, CompletionRequest, LanguageModel, VisionRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completions adapter. Text extraction and vision extraction can use
/// different models, both served by the same client.
pub struct OpenAiModel {
    client: LlmClient,
    text_model: String,
    vision_model: String,
}

impl OpenAiModel {
    pub fn from_config(config: &ScraperConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| ScrapeError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let mut client = LlmClient::new(api_key).with_timeout(REQUEST_TIMEOUT);
        if let Some(base_url) = &config.openai_base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(Self {
            client,
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
        })
    }

    /// Network failures (including timeouts) get a single retry. API and
    /// parse errors surface immediately.
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse> {
        match self.client.chat_completion(request.clone()).await {
            Ok(response) => Ok(response),
            Err(LlmError::Network(err)) => {
                warn!(error = %err, "chat completion failed, retrying once");
                Ok(self.client.chat_completion(request).await?)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn total_tokens(response: &ChatResponse) -> u32 {
    response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let mut chat = ChatRequest::new(&self.text_model);
        if let Some(system) = &request.system {
            chat = chat.message(Message::system(system));
        }
        let chat = chat
            .message(Message::user(&request.user))
            .temperature(request.temperature)
            .completion_limit(&self.text_model, request.max_tokens);

        let response = self.send(chat).await?;
        Ok(Completion {
            tokens_used: total_tokens(&response),
            text: response.content,
        })
    }

    async fn complete_vision(&self, request: VisionRequest) -> Result<Completion> {
        let data_url = format!(
            "data:image/png;base64,{}",
            STANDARD.encode(&request.image_png)
        );
        let chat = ChatRequest::new(&self.vision_model)
            .message(Message::system(&request.system))
            .message(Message::user_with_image(&request.user, data_url))
            .temperature(request.temperature)
            .completion_limit(&self.vision_model, request.max_tokens);

        let response = self.send(chat).await?;
        Ok(Completion {
            tokens_used: total_tokens(&response),
            text: response.content,
        })
    }
}
