use super::{apply_parameters, generate_id, ChatApiProvider};
use crate::models::chat::{ApiResponse, ChatMessage, Choice};
use crate::models::tools::{ToolCall, ToolDefinition, ToolFunction};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use toml::Value as TomlValue;
use tracing::warn;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible `/chat/completions`.
pub struct OpenAIApi {
    api_key: String,
    endpoint: String,
}

impl OpenAIApi {
    pub fn new(api_key: String, endpoint: Option<String>) -> Self {
        Self {
            api_key,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        }
    }
}

impl ChatApiProvider for OpenAIApi {
    fn build_payload(
        &self,
        model_name: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        parameters: Option<&TomlValue>,
    ) -> Result<Value> {
        let mut payload = json!({
            "model": model_name,
            "messages": messages
        });

        if let Some(tools) = tools {
            if !tools.is_empty() {
                let tools_with_type: Vec<Value> = tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters
                            }
                        })
                    })
                    .collect();
                payload["tools"] = json!(tools_with_type);
            }
        }

        apply_parameters(&mut payload, parameters, &["temperature", "top_p", "max_tokens"]);

        Ok(payload)
    }

    fn parse_response(&self, response_body: &str) -> Result<ApiResponse> {
        let raw_response: Value = serde_json::from_str(response_body)
            .with_context(|| format!("Failed to parse OpenAI response: {}", response_body))?;

        let response_id = raw_response
            .get("id")
            .and_then(|id| id.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                warn!("No ID in OpenAI response, generating one");
                generate_id("openai_resp")
            });

        let choices: Vec<Choice> = raw_response
            .get("choices")
            .and_then(|c| c.as_array())
            .map(|choices_array| {
                choices_array
                    .iter()
                    .enumerate()
                    .filter_map(|(index, choice)| parse_choice(index, choice))
                    .collect()
            })
            .unwrap_or_default();

        if choices.is_empty() {
            return Err(anyhow!(
                "Failed to extract choices from OpenAI response structure: {}",
                response_body
            ));
        }

        Ok(ApiResponse {
            id: response_id,
            choices,
        })
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if !self.api_key.is_empty() {
            headers.insert(
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            );
        }
        headers
    }

    fn get_endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

fn parse_choice(index: usize, choice: &Value) -> Option<Choice> {
    let message = choice.get("message")?;
    let role = message.get("role")?.as_str()?;
    let content = message.get("content").and_then(|c| c.as_str());
    let tool_calls: Option<Vec<ToolCall>> = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|tc| {
            tc.iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?;
                    let function = tc.get("function")?;
                    let name = function.get("name")?.as_str()?;
                    let arguments = function.get("arguments")?.as_str()?;
                    Some(ToolCall {
                        id: id.to_string(),
                        call_type: "function".to_string(),
                        function: ToolFunction {
                            name: name.to_string(),
                            arguments: arguments.to_string(),
                        },
                    })
                })
                .collect()
        });
    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .unwrap_or("stop");

    Some(Choice {
        index: index as u32,
        message: ChatMessage {
            role: role.to_string(),
            content: content.map(|s| s.to_string()),
            tool_calls: tool_calls.filter(|calls| !calls.is_empty()),
            tool_call_id: None,
        },
        finish_reason: finish_reason.to_string(),
    })
}
