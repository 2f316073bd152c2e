// beech-core/src/errors.rs
use thiserror::Error;

/// Errors that end a chat turn.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Error related to configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// The incoming message was empty or whitespace.
    #[error("Message is required")]
    EmptyMessage,

    /// Error during interaction with the AI model API.
    #[error("API Error: {0:#}")]
    Api(#[source] anyhow::Error),

    /// The model finished without producing any text.
    #[error("No response generated")]
    NoResponse,

    /// Error related to tool definition or execution.
    #[error("Tool Error: {0}")]
    Tool(String),
}

impl ChatError {
    pub fn config(msg: impl Into<String>) -> Self {
        ChatError::Config(msg.into())
    }

    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChatError::EmptyMessage)
    }
}

/// Reasons a tool call is refused before or during dispatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown function: {0}")]
    UnknownTool(String),

    #[error("Missing required argument '{argument}' for tool '{tool}'")]
    MissingArgument { tool: String, argument: String },

    #[error("Argument '{argument}' for tool '{tool}' must be of type {expected}")]
    InvalidType {
        tool: String,
        argument: String,
        expected: &'static str,
    },

    #[error("Argument '{argument}' for tool '{tool}' must be one of [{allowed}], got '{value}'")]
    InvalidEnum {
        tool: String,
        argument: String,
        value: String,
        allowed: String,
    },
}
