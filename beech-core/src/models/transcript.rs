// beech-core/src/models/transcript.rs

//! Conversation turns as the chat client sees them, and the `/api/chat`
//! request/response bodies. These use camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FunctionCallStatus {
    Pending,
    Success,
    Error,
}

/// One tool invocation made while answering a turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    pub status: FunctionCallStatus,
}

impl FunctionCall {
    pub fn pending(name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            name: name.into(),
            arguments,
            result: None,
            status: FunctionCallStatus::Pending,
        }
    }

    pub fn complete(mut self, result: JsonValue, status: FunctionCallStatus) -> Self {
        self.result = Some(result);
        self.status = status;
        self
    }
}

/// A single chat turn stored by the client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<FunctionCall>>,
}

impl TranscriptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            function_calls: None,
        }
    }

    pub fn with_function_calls(mut self, calls: Vec<FunctionCall>) -> Self {
        if !calls.is_empty() {
            self.function_calls = Some(calls);
        }
        self
    }
}

/// Body of `POST /api/chat`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<TranscriptMessage>,
}

/// Successful body of `POST /api/chat`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}
