// beech-core/src/agent.rs

//! The conversation orchestrator: one chat turn from user message to final
//! assistant text, running whatever tools the model asks for on the way.

use crate::config::{AgentConfig, ChatLimits};
use crate::errors::ChatError;
use crate::models::chat::ChatMessage;
use crate::models::tools::{ToolCall, ToolDefinition, ToolInput};
use crate::models::transcript::{FunctionCall, FunctionCallStatus, TranscriptMessage};
use crate::prompts;
use crate::providers::{Provider, ProviderRegistry};
use crate::tools::{ToolOutcome, ToolProvider};
use crate::utils::log_preview;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// What a finished turn hands back to the caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: String,
    pub function_calls: Vec<FunctionCall>,
    pub stop_reason: Option<String>,
}

/// Holds only read-only collaborators, so concurrent turns never share state.
pub struct ChatOrchestrator {
    provider: Arc<dyn Provider>,
    tool_provider: Arc<dyn ToolProvider>,
    tool_definitions: Vec<ToolDefinition>,
    system_prompt: Option<String>,
    limits: ChatLimits,
}

impl ChatOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        tool_provider: Arc<dyn ToolProvider>,
        system_prompt: Option<String>,
        limits: ChatLimits,
    ) -> Result<Self, ChatError> {
        if limits.max_iterations == 0 {
            return Err(ChatError::config("chat.max_iterations must be at least 1"));
        }
        let tool_definitions = tool_provider.get_tool_definitions();
        let mut seen = HashSet::new();
        for def in &tool_definitions {
            if !seen.insert(def.name.as_str()) {
                return Err(ChatError::Tool(format!("Duplicate tool definition: {}", def.name)));
            }
        }
        info!(
            provider = provider.name(),
            tools = tool_definitions.len(),
            "Chat orchestrator ready."
        );
        Ok(Self {
            provider,
            tool_provider,
            tool_definitions,
            system_prompt,
            limits,
        })
    }

    /// Uses the configured default provider, prompt override and limits.
    pub fn from_config(
        config: &AgentConfig,
        registry: &ProviderRegistry,
        tool_provider: Arc<dyn ToolProvider>,
    ) -> Result<Self, ChatError> {
        let provider = registry
            .default()
            .map_err(|e| ChatError::config(format!("{:#}", e)))?;
        Self::new(
            provider,
            tool_provider,
            config.system_prompt.clone(),
            config.chat.clone(),
        )
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tool_definitions
    }

    pub async fn respond(
        &self,
        message: &str,
        history: &[TranscriptMessage],
    ) -> Result<ChatReply, ChatError> {
        self.respond_on(message, history, Local::now().date_naive()).await
    }

    /// [`respond`](Self::respond) with an explicit date for the system prompt.
    pub async fn respond_on(
        &self,
        message: &str,
        history: &[TranscriptMessage],
        today: NaiveDate,
    ) -> Result<ChatReply, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        info!(
            history = history.len(),
            message = %log_preview(message, 80),
            "Starting chat turn."
        );

        let mut messages = self.initial_messages(message, history, today);
        let mut function_calls: Vec<FunctionCall> = Vec::new();
        let mut latest_text: Option<String> = None;

        // One model call per tool round, plus the follow-up after the last round.
        for iteration in 1..=self.limits.max_iterations.saturating_add(1) {
            debug!(
                iteration,
                message_count = messages.len(),
                "Sending request to AI model."
            );
            trace!(payload = %serde_json::to_string_pretty(&messages).unwrap_or_else(|e| format!("Serialization error: {}", e)), "Messages sent to API");

            let api_response = self
                .provider
                .get_completion(messages.clone(), Some(&self.tool_definitions))
                .await
                .map_err(|e| {
                    error!(error = ?e, "API call failed during chat turn.");
                    ChatError::Api(e.context("API call failed during chat turn"))
                })?;

            let choice = api_response.choices.into_iter().next().ok_or_else(|| {
                error!("API response contained no choices.");
                ChatError::NoResponse
            })?;
            let stop_reason = Some(choice.finish_reason.clone());
            let response_message = choice.message;
            trace!(message = %serde_json::to_string_pretty(&response_message).unwrap_or_default(), "Assistant Message Details");

            let text = response_message
                .content
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if text.is_some() {
                latest_text = text.clone();
            }

            let tool_calls = match &response_message.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => {
                    info!(
                        iteration,
                        tool_calls = function_calls.len(),
                        "Received final response from AI."
                    );
                    let message = text.ok_or(ChatError::NoResponse)?;
                    return Ok(ChatReply {
                        message,
                        function_calls,
                        stop_reason,
                    });
                }
            };

            if iteration > self.limits.max_iterations {
                warn!(
                    max_iterations = self.limits.max_iterations,
                    skipped = tool_calls.len(),
                    "Tool rounds exhausted, ignoring further tool calls and returning latest text."
                );
                let message = latest_text.ok_or(ChatError::NoResponse)?;
                return Ok(ChatReply {
                    message,
                    function_calls,
                    stop_reason,
                });
            }

            info!(
                count = tool_calls.len(),
                "AI requested {} tool call(s).",
                tool_calls.len()
            );
            messages.push(response_message);
            for tool_call in &tool_calls {
                let (record, tool_message) = self.run_tool_call(tool_call).await;
                function_calls.push(record);
                messages.push(tool_message);
            }
        }

        Err(ChatError::NoResponse)
    }

    /// `[system] + trailing history window + user message`.
    fn initial_messages(
        &self,
        message: &str,
        history: &[TranscriptMessage],
        today: NaiveDate,
    ) -> Vec<ChatMessage> {
        let window_start = history.len().saturating_sub(self.limits.history_window);
        let mut messages = Vec::with_capacity(history.len() - window_start + 2);
        messages.push(ChatMessage::system(prompts::system_prompt(
            self.system_prompt.as_deref(),
            today,
        )));
        messages.extend(
            history[window_start..]
                .iter()
                .filter(|m| !m.content.trim().is_empty())
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                    ..Default::default()
                }),
        );
        messages.push(ChatMessage::user(message));
        messages
    }

    /// Runs one requested tool call. Never fails: every error is reported
    /// back to the model as the tool result.
    async fn run_tool_call(&self, tool_call: &ToolCall) -> (FunctionCall, ChatMessage) {
        let tool_name = tool_call.function.name.as_str();
        debug!(tool_call_id = %tool_call.id, tool_name = %tool_name, "Processing request for tool '{}'.", tool_name);
        trace!(arguments = %tool_call.function.arguments, "Raw Tool Arguments for '{}'", tool_name);

        let (arguments, outcome) = match ToolInput::from_arguments_str(&tool_call.function.arguments) {
            Ok(input) => {
                let arguments = input.clone().into_value();
                match self.tool_provider.execute_tool(tool_name, input).await {
                    Ok(outcome) => {
                        info!(tool_call_id = %tool_call.id, tool_name = %tool_name, success = outcome.success, "Tool '{}' executed.", tool_name);
                        (arguments, outcome)
                    }
                    Err(e) => {
                        error!(tool_call_id = %tool_call.id, tool_name = %tool_name, error = ?e, "Execution failed for tool '{}'.", tool_name);
                        (arguments, ToolOutcome::failure(format!("Error: {:#}", e)))
                    }
                }
            }
            Err(e) => {
                error!(tool_call_id = %tool_call.id, tool_name = %tool_name, error = ?e, "Failed to parse arguments for tool '{}'.", tool_name);
                (
                    JsonValue::String(tool_call.function.arguments.clone()),
                    ToolOutcome::failure(format!("Error: invalid arguments for '{}': {}", tool_name, e)),
                )
            }
        };

        let status = if outcome.success {
            FunctionCallStatus::Success
        } else {
            FunctionCallStatus::Error
        };
        let result = outcome.to_value();
        let tool_message = ChatMessage::tool(tool_call.id.clone(), result.to_string());
        let record = FunctionCall::pending(tool_name, arguments).complete(result, status);
        (record, tool_message)
    }
}
