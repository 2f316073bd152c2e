// beech-core/src/tools/mod.rs

//! Tools the assistant can call and the collaborators behind them.
//!
//! [`registry`] is the static catalog advertised to the model. [`executor`]
//! dispatches a named call to the Google Ads, Calendar, SMTP and web
//! collaborators defined alongside it.

use crate::models::tools::{ToolDefinition, ToolInput};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod calendar;
pub mod executor;
pub mod google_ads;
pub mod google_auth;
pub mod keywords;
pub mod mailer;
pub mod registry;
pub mod report;
pub mod web;

/// Supplies tool definitions to the orchestrator and executes tool calls.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Returns the definitions of all tools available.
    fn get_tool_definitions(&self) -> Vec<ToolDefinition>;
    /// Executes the tool with the given name and input arguments.
    ///
    /// `Err` means the call never produced an outcome: unknown tool, invalid
    /// arguments, or a collaborator failure.
    async fn execute_tool(&self, tool_name: &str, input: ToolInput) -> Result<ToolOutcome>;
}

/// The JSON a tool hands back to the model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
    pub message: String,
}

impl ToolOutcome {
    pub fn ok(data: impl Serialize, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// `"s"` when `count` is not one.
pub(crate) fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
