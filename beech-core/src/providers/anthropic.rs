// beech-core/src/providers/anthropic.rs
use super::Provider;
use crate::api::{self, anthropic::AnthropicApi};
use crate::config::ModelConfig;
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

#[derive(Clone)]
pub struct AnthropicProvider {
    config: ModelConfig,
    http_client: Client,
    api_key: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: ModelConfig, http_client: Client, api_key: String, max_tokens: u32) -> Self {
        Self {
            config,
            http_client,
            api_key,
            max_tokens,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.model_name
    }

    async fn get_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse> {
        if self.api_key.is_empty() {
            warn!(
                model = %self.config.model_name,
                "API key is empty for Anthropic provider. The API call will likely fail."
            );
        }
        let api = AnthropicApi::new(
            self.api_key.clone(),
            self.config.endpoint.clone(),
            self.max_tokens,
        );
        api::call_chat_completion_api(
            &self.http_client,
            &api,
            &self.config.model_name,
            &messages,
            tools,
            self.config.parameters.as_ref(),
        )
        .await
    }
}
