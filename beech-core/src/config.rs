// beech-core/src/config.rs

//! Handles configuration structures and parsing for the assistant.
//!
//! Configuration lives in a TOML file (`Beech.toml`). Secrets never do: API
//! keys and Google/SMTP credentials are read from environment variables.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

pub const PROVIDER_ANTHROPIC: &str = "anthropic";
pub const PROVIDER_OPENAI: &str = "openai";

#[derive(Deserialize, Debug, Clone)]
pub struct AgentConfig {
    /// Overrides the built-in system prompt. `{today}` is substituted.
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub default_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderInstanceConfig>,
    #[serde(default)]
    pub chat: ChatLimits,
    #[serde(default)]
    pub google_ads: GoogleAdsConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub keyword_research: KeywordResearchConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProviderInstanceConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub api_key_env_var: String,
    pub model_config: ModelConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default)]
    pub parameters: Option<toml::Value>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ChatLimits {
    /// How many trailing history messages are replayed to the model.
    pub history_window: usize,
    /// Tool rounds per turn. Each round is followed by another model call.
    pub max_iterations: usize,
    pub max_tokens: u32,
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            history_window: 10,
            max_iterations: 10,
            max_tokens: 4096,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GoogleAdsConfig {
    pub endpoint: String,
    pub api_version: String,
    pub token_endpoint: String,
}

impl Default for GoogleAdsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://googleads.googleapis.com".to_string(),
            api_version: "v18".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CalendarConfig {
    pub endpoint: String,
    pub calendar_id: String,
    pub max_results: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/calendar/v3".to_string(),
            calendar_id: "primary".to_string(),
            max_results: 250,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP host. Falls back to `EMAIL_HOST` when unset.
    pub host: Option<String>,
    pub port: u16,
    /// Implicit TLS (port 465 style) instead of STARTTLS.
    pub secure: bool,
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            secure: false,
            from_name: "PPC AI Agent".to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct KeywordResearchConfig {
    /// Geo target constant, 2036 is Australia.
    pub location: String,
    /// Language constant, 1000 is English.
    pub language: String,
    /// Ideas returned to the chat.
    pub chat_limit: usize,
    /// Ideas sent to the model for theme grouping.
    pub analysis_limit: usize,
}

impl Default for KeywordResearchConfig {
    fn default() -> Self {
        Self {
            location: "2036".to_string(),
            language: "1000".to_string(),
            chat_limit: 20,
            analysis_limit: 100,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WebConfig {
    pub timeout_secs: u64,
    pub max_content_chars: usize,
    pub user_agent: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_content_chars: 10_000,
            user_agent: "Mozilla/5.0 (compatible; BeechPPC-Bot/1.0; +https://beechppc.com)"
                .to_string(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(config_toml_content: &str) -> Result<AgentConfig> {
        let config: AgentConfig = match toml::from_str(config_toml_content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse TOML content");
                return Err(anyhow!(e))
                    .context("Failed to parse configuration TOML content. Check TOML syntax.");
            }
        };

        // --- Basic Checks ---
        if let Some(prompt) = &config.system_prompt {
            if prompt.trim().is_empty() {
                return Err(anyhow!("'system_prompt' in config content is empty."));
            }
        }
        if config.default_provider.trim().is_empty() {
            return Err(anyhow!("'default_provider' key in config content is empty."));
        }
        if !config.providers.contains_key(&config.default_provider) {
            return Err(anyhow!(
                "Default provider '{}' not found in [providers] map.",
                config.default_provider
            ));
        }
        if config.chat.max_iterations == 0 {
            return Err(anyhow!("'chat.max_iterations' must be at least 1."));
        }

        // --- Provider Validation ---
        for (key, provider) in &config.providers {
            match provider.provider_type.as_str() {
                PROVIDER_ANTHROPIC | PROVIDER_OPENAI => {}
                "" => {
                    return Err(anyhow!("Provider '{}' is missing 'type'.", key));
                }
                other => {
                    return Err(anyhow!(
                        "Provider '{}' has unsupported type '{}'. Expected '{}' or '{}'.",
                        key,
                        other,
                        PROVIDER_ANTHROPIC,
                        PROVIDER_OPENAI
                    ));
                }
            }
            if provider.model_config.model_name.trim().is_empty() {
                return Err(anyhow!(
                    "Provider '{}' is missing 'model_config.model_name'.",
                    key
                ));
            }
            if provider.api_key_env_var.trim().is_empty() {
                return Err(anyhow!("Provider '{}' is missing 'api_key_env_var'.", key));
            }
            if let Some(endpoint) = &provider.model_config.endpoint {
                validate_url(endpoint)
                    .with_context(|| format!("Invalid endpoint in provider '{}'.", key))?;
            }
            if let Some(params) = &provider.model_config.parameters {
                if !params.is_table() {
                    return Err(anyhow!(
                        "Provider '{}' has invalid 'model_config.parameters'. Expected a TOML table.",
                        key
                    ));
                }
            }
        }

        // --- Collaborator endpoints ---
        validate_url(&config.google_ads.endpoint).context("Invalid 'google_ads.endpoint'.")?;
        validate_url(&config.google_ads.token_endpoint)
            .context("Invalid 'google_ads.token_endpoint'.")?;
        validate_url(&config.calendar.endpoint).context("Invalid 'calendar.endpoint'.")?;

        tracing::info!("Successfully parsed and validated assistant configuration.");
        Ok(config)
    }

    pub fn default_provider_config(&self) -> Result<&ProviderInstanceConfig> {
        self.providers
            .get(&self.default_provider)
            .ok_or_else(|| anyhow!("Default provider '{}' is not configured", self.default_provider))
    }
}

fn validate_url(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        return Err(anyhow!("URL is empty"));
    }
    Url::parse(raw).with_context(|| format!("Invalid URL format: '{}'", raw))?;
    Ok(())
}
