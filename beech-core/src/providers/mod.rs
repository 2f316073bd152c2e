// beech-core/src/providers/mod.rs
use crate::config::{AgentConfig, PROVIDER_ANTHROPIC, PROVIDER_OPENAI};
use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn get_completion(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ApiResponse>;
    fn name(&self) -> &str;
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new(default_provider: String) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
        }
    }

    /// Builds every configured provider. API keys come from the environment;
    /// a missing key is logged and left for the vendor to reject.
    pub fn from_config(config: &AgentConfig, http_client: Client) -> Result<Self> {
        let mut registry = Self::new(config.default_provider.clone());
        for (id, instance) in &config.providers {
            let api_key = match std::env::var(&instance.api_key_env_var) {
                Ok(key) => key,
                Err(_) => {
                    warn!(
                        provider = %id,
                        env_var = %instance.api_key_env_var,
                        "API key environment variable not set."
                    );
                    String::new()
                }
            };
            let provider: Arc<dyn Provider> = match instance.provider_type.as_str() {
                PROVIDER_ANTHROPIC => Arc::new(AnthropicProvider::new(
                    instance.model_config.clone(),
                    http_client.clone(),
                    api_key,
                    config.chat.max_tokens,
                )),
                PROVIDER_OPENAI => Arc::new(OpenAIProvider::new(
                    instance.model_config.clone(),
                    http_client.clone(),
                    api_key,
                )),
                other => return Err(anyhow!("Unsupported provider type: {}", other)),
            };
            debug!(provider = %id, model = %provider.name(), "Registered provider.");
            registry.register(id.clone(), provider);
        }
        Ok(registry)
    }

    pub fn register(&mut self, id: String, provider: Arc<dyn Provider>) {
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Provider not found: {}", id))
    }

    pub fn default(&self) -> Result<Arc<dyn Provider>> {
        self.get(&self.default_provider)
    }

    pub fn default_provider_id(&self) -> &str {
        &self.default_provider
    }
}
