// beech-core/src/api/mod.rs

//! Wire formats of the supported chat completion APIs.
//!
//! Each [`ChatApiProvider`] turns our provider-neutral [`ChatMessage`] list into
//! its vendor payload and parses the vendor reply back into an [`ApiResponse`].
//! [`call_chat_completion_api`] does the HTTP round trip.

use crate::models::chat::{ApiResponse, ChatMessage};
use crate::models::tools::ToolDefinition;
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use toml::Value as TomlValue;
use tracing::{debug, trace};

pub mod anthropic;
pub mod openai;

pub trait ChatApiProvider: Send + Sync {
    /// Builds the request payload for the specific API provider
    fn build_payload(
        &self,
        model_name: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        parameters: Option<&TomlValue>,
    ) -> Result<Value>;

    /// Parses the API response into our common ApiResponse format
    fn parse_response(&self, response_body: &str) -> Result<ApiResponse>;

    /// Builds the headers for the API request
    fn build_headers(&self) -> HashMap<String, String>;

    /// Gets the endpoint URL for the API request
    fn get_endpoint(&self) -> String;
}

/// Generic function to make a request to an AI chat completion API
pub async fn call_chat_completion_api(
    http_client: &Client,
    provider: &dyn ChatApiProvider,
    model_name: &str,
    messages: &[ChatMessage],
    tools: Option<&[ToolDefinition]>,
    parameters: Option<&TomlValue>,
) -> Result<ApiResponse> {
    let endpoint = provider.get_endpoint();
    let headers = provider.build_headers();
    let payload = provider.build_payload(model_name, messages, tools, parameters)?;

    debug!(endpoint = %endpoint, model = %model_name, num_messages = messages.len(), "Calling chat completion API");
    trace!(payload = %payload, "Chat completion payload");

    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        if let (Ok(name), Ok(val)) = (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(&value),
        ) {
            header_map.insert(name, val);
        }
    }

    let response = http_client
        .post(&endpoint)
        .headers(header_map)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("Failed to send request to {}", endpoint))?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .context("Failed to read chat completion response body")?;

    if !status.is_success() {
        return Err(anyhow!(
            "API call failed with status {}: {}",
            status,
            response_text
        ));
    }

    trace!(body = %response_text, "Chat completion response body");
    provider.parse_response(&response_text)
}

/// Copies numeric sampling parameters from a TOML table into a JSON payload.
pub(crate) fn apply_parameters(payload: &mut Value, parameters: Option<&TomlValue>, keys: &[&str]) {
    let Some(params) = parameters else {
        return;
    };
    for key in keys {
        match params.get(*key) {
            Some(TomlValue::Float(f)) => payload[*key] = Value::from(*f),
            Some(TomlValue::Integer(i)) => payload[*key] = Value::from(*i),
            _ => {}
        }
    }
}

/// Generates a relatively unique ID string using nanoseconds.
pub(crate) fn generate_id(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}_{}", prefix, nanos)
}
