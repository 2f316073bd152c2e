// beech-core/src/models/tools.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

// --- Structs for AI Tool Interaction ---

/// A tool call requested by the AI model.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // Usually "function"
    pub function: ToolFunction,
}

/// The function call details within a ToolCall.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolFunction {
    pub name: String,
    /// Arguments are a JSON-encoded object, as the model produced them.
    pub arguments: String,
}

// --- Tool Definitions ---

/// Schema of a tool advertised to the AI (`FunctionTool`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "input_schema", alias = "parameters")]
    pub parameters: ToolParametersDefinition,
}

/// The `input_schema` object of a tool. Always of JSON type `object`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParametersDefinition {
    #[serde(rename = "type")]
    pub param_type: String,
    pub properties: BTreeMap<String, ToolParameter>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// A single parameter within a tool's schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolParameter {
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameter>>,
}

/// The JSON type of a tool parameter.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ToolParameterType {
    /// Whether `value` is an instance of this JSON type.
    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            ToolParameterType::String => value.is_string(),
            ToolParameterType::Integer => value.is_i64() || value.is_u64(),
            ToolParameterType::Number => value.is_number(),
            ToolParameterType::Boolean => value.is_boolean(),
            ToolParameterType::Array => value.is_array(),
            ToolParameterType::Object => value.is_object(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Number => "number",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        }
    }
}

impl ToolParametersDefinition {
    /// An object schema with no properties.
    pub fn empty() -> Self {
        Self {
            param_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.properties.get(name)
    }
}

/// The input arguments provided for a tool execution at runtime.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ToolInput {
    pub arguments: Map<String, JsonValue>,
}

impl ToolInput {
    /// Parses the JSON-encoded argument string of a [`ToolCall`].
    /// An empty string is treated as an empty object.
    pub fn from_arguments_str(arguments: &str) -> Result<Self, serde_json::Error> {
        if arguments.trim().is_empty() {
            return Ok(Self::default());
        }
        let arguments: Map<String, JsonValue> = serde_json::from_str(arguments)?;
        Ok(Self { arguments })
    }

    pub fn into_value(self) -> JsonValue {
        JsonValue::Object(self.arguments)
    }
}
