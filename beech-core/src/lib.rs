// beech-core/src/lib.rs

#![doc = include_str!("../../README.md")]

pub mod agent;
pub mod api;
pub mod config;
pub mod errors;
pub mod models;
pub mod prompts;
pub mod providers;
pub mod tools;
pub mod utils;

#[cfg(test)]
mod agent_tests;

pub use agent::{ChatOrchestrator, ChatReply};
pub use config::{AgentConfig, ChatLimits, ModelConfig};
pub use errors::{ChatError, ToolError};
pub use models::chat::{ApiResponse, ChatMessage, Choice};
pub use models::tools::{
    ToolCall, ToolDefinition, ToolFunction, ToolInput, ToolParameter, ToolParameterType,
    ToolParametersDefinition,
};
pub use models::transcript::{
    ChatRequest, ChatResponse, FunctionCall, FunctionCallStatus, Role, TranscriptMessage,
};
pub use providers::{Provider, ProviderRegistry};
pub use tools::executor::AdsToolProvider;
pub use tools::{ToolOutcome, ToolProvider};

pub use async_trait::async_trait;
