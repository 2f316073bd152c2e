use super::{apply_parameters, generate_id, ChatApiProvider};
use crate::models::chat::{ApiResponse, ChatMessage, Choice};
use crate::models::tools::{ToolCall, ToolDefinition, ToolFunction};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use toml::Value as TomlValue;
use tracing::{error, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API.
///
/// System messages are lifted into the top-level `system` field, assistant tool
/// calls become `tool_use` blocks, and consecutive tool results are folded into
/// one `user` message of `tool_result` blocks.
pub struct AnthropicApi {
    api_key: String,
    endpoint: String,
    max_tokens: u32,
}

impl AnthropicApi {
    pub fn new(api_key: String, endpoint: Option<String>, max_tokens: u32) -> Self {
        Self {
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            max_tokens,
        }
    }
}

impl ChatApiProvider for AnthropicApi {
    fn build_payload(
        &self,
        model_name: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        parameters: Option<&TomlValue>,
    ) -> Result<Value> {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut wire_messages: Vec<Value> = Vec::new();
        let mut pending_results: Vec<Value> = Vec::new();

        for message in messages {
            if message.role != "tool" && !pending_results.is_empty() {
                wire_messages.push(json!({
                    "role": "user",
                    "content": std::mem::take(&mut pending_results)
                }));
            }
            match message.role.as_str() {
                "system" => {
                    if let Some(content) = &message.content {
                        system_parts.push(content);
                    }
                }
                "tool" => {
                    let Some(tool_call_id) = &message.tool_call_id else {
                        warn!("Tool message missing tool_call_id, skipping.");
                        continue;
                    };
                    pending_results.push(json!({
                        "type": "tool_result",
                        "tool_use_id": tool_call_id,
                        "content": message.content.clone().unwrap_or_default()
                    }));
                }
                "assistant" => {
                    // The API requires the conversation to open with a user turn.
                    if wire_messages.is_empty() {
                        continue;
                    }
                    if let Some(block) = assistant_content(message) {
                        wire_messages.push(json!({ "role": "assistant", "content": block }));
                    }
                }
                "user" => {
                    if let Some(content) = message.content.as_deref().filter(|c| !c.trim().is_empty()) {
                        wire_messages.push(json!({ "role": "user", "content": content }));
                    }
                }
                other => warn!(role = %other, "Unknown role for Anthropic mapping, skipping message."),
            }
        }
        if !pending_results.is_empty() {
            wire_messages.push(json!({ "role": "user", "content": pending_results }));
        }

        let mut payload = json!({
            "model": model_name,
            "max_tokens": self.max_tokens,
            "messages": wire_messages
        });
        if !system_parts.is_empty() {
            payload["system"] = json!(system_parts.join("\n\n"));
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                payload["tools"] = serde_json::to_value(tools)
                    .context("Failed to serialize tool definitions")?;
            }
        }
        apply_parameters(&mut payload, parameters, &["temperature", "top_p", "top_k", "max_tokens"]);

        Ok(payload)
    }

    fn parse_response(&self, response_body: &str) -> Result<ApiResponse> {
        let raw: Value = serde_json::from_str(response_body)
            .with_context(|| format!("Failed to parse Anthropic response: {}", response_body))?;

        if raw.get("type").and_then(Value::as_str) == Some("error") {
            let message = raw
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(anyhow!("Anthropic API returned an error: {}", message));
        }

        let blocks = raw
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Anthropic response has no content array: {}", response_body))?;

        let mut texts: Vec<&str> = Vec::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        texts.push(text);
                    }
                }
                Some("tool_use") => {
                    let (Some(id), Some(name)) = (
                        block.get("id").and_then(Value::as_str),
                        block.get("name").and_then(Value::as_str),
                    ) else {
                        error!(block = %block, "tool_use block missing id or name, skipping.");
                        continue;
                    };
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    tool_calls.push(ToolCall {
                        id: id.to_string(),
                        call_type: "function".to_string(),
                        function: ToolFunction {
                            name: name.to_string(),
                            arguments: input.to_string(),
                        },
                    });
                }
                _ => {}
            }
        }

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| generate_id("anthropic_resp"));
        let finish_reason = raw
            .get("stop_reason")
            .and_then(Value::as_str)
            .unwrap_or("end_turn")
            .to_string();

        Ok(ApiResponse {
            id,
            choices: vec![Choice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: if texts.is_empty() {
                        None
                    } else {
                        Some(texts.join("\n"))
                    },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: None,
                },
                finish_reason,
            }],
        })
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("anthropic-version".to_string(), API_VERSION.to_string());
        if !self.api_key.is_empty() {
            headers.insert("x-api-key".to_string(), self.api_key.clone());
        }
        headers
    }

    fn get_endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

/// Content blocks for an assistant turn, or None when it carries nothing.
fn assistant_content(message: &ChatMessage) -> Option<Value> {
    let mut blocks = Vec::new();
    if let Some(text) = message.content.as_deref().filter(|c| !c.trim().is_empty()) {
        blocks.push(json!({ "type": "text", "text": text }));
    }
    for call in message.tool_calls.iter().flatten() {
        let input: Value = match serde_json::from_str(&call.function.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, tool_name = %call.function.name, "Unparseable tool arguments, sending empty input.");
                json!({})
            }
        };
        blocks.push(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.function.name,
            "input": input
        }));
    }
    if blocks.is_empty() {
        None
    } else {
        Some(Value::Array(blocks))
    }
}
