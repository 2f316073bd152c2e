// beech-core/src/providers/openai.rs
use super::Provider;
use crate::api::{self, openai::OpenAIApi};
use crate::config::ModelConfig;
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

#[derive(Clone)]
pub struct OpenAIProvider {
    config: ModelConfig,
    http_client: Client,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: ModelConfig, http_client: Client, api_key: String) -> Self {
        Self {
            config,
            http_client,
            api_key,
        }
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.model_name
    }

    async fn get_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse> {
        if self.config.endpoint.is_none() {
            warn!(
                model = %self.config.model_name,
                endpoint = api::openai::DEFAULT_ENDPOINT,
                "No endpoint specified for OpenAI provider, using default."
            );
        }
        if self.api_key.is_empty() {
            warn!(
                model = %self.config.model_name,
                "API key is empty for OpenAI provider. The API call will likely fail."
            );
        }
        let api = OpenAIApi::new(self.api_key.clone(), self.config.endpoint.clone());
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
