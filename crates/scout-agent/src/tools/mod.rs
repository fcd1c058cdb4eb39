mod bash;
mod editor;
mod glob;
mod grep;
mod output;
mod ping;
mod read_file;
mod sub_agent;
mod todos;

use crate::errors::ToolError;
use crate::events::{AgentEvent, EventBus};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use bash::bash_tool;
pub use editor::text_editor_tool;
pub use glob::glob_tool;
pub use grep::grep_tool;
pub use output::output_tool;
pub use ping::ping_tool;
pub use read_file::read_file_tool;
pub use sub_agent::{AgentFactory, SubAgentFlavor, sub_agent_tool};
pub use todos::write_todos_tool;

pub const OUTPUT_TOOL: &str = "output";
pub const BASH_TOOL: &str = "bash";
pub const PING_TOOL: &str = "ping";
pub const READ_FILE_TOOL: &str = "read_file";
pub const GLOB_TOOL: &str = "glob";
pub const GREP_TOOL: &str = "grep";
pub const TEXT_EDITOR_TOOL: &str = "text_editor";
pub const WRITE_TODOS_TOOL: &str = "write_todos";
pub const SUB_AGENT_TOOL: &str = "sub_agent";

pub type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;
pub type ToolExecutor = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// Outcome of one tool invocation, reported back to the model verbatim.
///
/// Failure is data, not an error: dispatch never propagates a tool failure
/// to the agent loop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    /// Wire form fed back to the model as the tool result body.
    ///
    /// Renders the payload on success and `{"error": ...}` on failure; the
    /// success flag itself never crosses the wire.
    pub fn content(&self) -> String {
        let body = if self.is_error() {
            json!({ "error": self.error })
        } else {
            self.data.clone().unwrap_or_else(|| json!({}))
        };
        body.to_string()
    }
}

#[derive(Clone)]
pub struct Tool {
    pub definition: scout_llm::ToolDefinition,
    pub executor: ToolExecutor,
}

impl Tool {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Run the tool inside the full dispatch envelope.
    ///
    /// Emits a start event, validates the input against the tool's schema,
    /// runs the executor, and emits a completion or error event. Every
    /// failure mode is converted into a failed `ToolResult`; this function
    /// is total.
    pub async fn dispatch(&self, bus: &EventBus, input: Value) -> ToolResult {
        let name = self.definition.name.clone();
        bus.emit(AgentEvent::ToolStarted {
            tool_name: name.clone(),
            input: input.clone(),
        });

        if let Err(error) = validate_tool_arguments(&self.definition.input_schema, &input) {
            let message = error.to_string();
            bus.emit(AgentEvent::ToolError {
                tool_name: name,
                error: message.clone(),
            });
            return ToolResult::fail(message);
        }

        match (self.executor)(input).await {
            Ok(output) => {
                bus.emit(AgentEvent::ToolCompleted {
                    tool_name: name,
                    output: Some(output.clone()),
                });
                ToolResult::ok(output)
            }
            Err(error) => {
                let message = error.to_string();
                bus.emit(AgentEvent::ToolError {
                    tool_name: name,
                    error: message.clone(),
                });
                ToolResult::fail(message)
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    pub fn unregister(&mut self, name: &str) -> Option<Tool> {
        self.tools.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<scout_llm::ToolDefinition> {
        let mut definitions: Vec<scout_llm::ToolDefinition> = self
            .tools
            .values()
            .map(|tool| tool.definition.clone())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Dispatch by name; an unknown name is a failed result, never fatal.
    pub async fn dispatch(&self, bus: &EventBus, name: &str, input: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            let message = format!("tool '{name}' not found");
            bus.emit(AgentEvent::ToolError {
                tool_name: name.to_string(),
                error: message.clone(),
            });
            return ToolResult::fail(message);
        };
        tool.dispatch(bus, input).await
    }
}

pub(crate) fn required_string_argument(arguments: &Value, key: &str) -> Result<String, ToolError> {
    optional_string_argument(arguments, key)?
        .ok_or_else(|| ToolError::Validation(format!("missing required argument '{}'", key)))
}

pub(crate) fn optional_string_argument(
    arguments: &Value,
    key: &str,
) -> Result<Option<String>, ToolError> {
    let Some(value) = arguments.get(key) else {
        return Ok(None);
    };
    let Some(value) = value.as_str() else {
        return Err(ToolError::Validation(format!(
            "argument '{}' must be a string",
            key
        )));
    };
    Ok(Some(value.to_string()))
}

pub(crate) fn optional_u64_argument(arguments: &Value, key: &str) -> Result<Option<u64>, ToolError> {
    let Some(value) = arguments.get(key) else {
        return Ok(None);
    };
    let Some(value) = value.as_u64() else {
        return Err(ToolError::Validation(format!(
            "argument '{}' must be a positive integer",
            key
        )));
    };
    Ok(Some(value))
}

pub(crate) fn optional_usize_argument(
    arguments: &Value,
    key: &str,
) -> Result<Option<usize>, ToolError> {
    Ok(optional_u64_argument(arguments, key)?.map(|value| value as usize))
}

pub(crate) fn optional_bool_argument(
    arguments: &Value,
    key: &str,
) -> Result<Option<bool>, ToolError> {
    let Some(value) = arguments.get(key) else {
        return Ok(None);
    };
    let Some(value) = value.as_bool() else {
        return Err(ToolError::Validation(format!(
            "argument '{}' must be a boolean",
            key
        )));
    };
    Ok(Some(value))
}

/// Check arguments against the declared JSON schema shape.
///
/// Covers required keys, primitive property types, and
/// `additionalProperties: false`; nested schemas are intentionally not
/// walked, matching what tool inputs here actually use.
pub(crate) fn validate_tool_arguments(schema: &Value, arguments: &Value) -> Result<(), ToolError> {
    let object = arguments
        .as_object()
        .ok_or_else(|| ToolError::Validation("tool arguments must be a JSON object".to_string()))?;

    let schema_object = schema.as_object().ok_or_else(|| {
        ToolError::Validation("tool schema root must be a JSON object".to_string())
    })?;

    if schema_object
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|schema_type| schema_type != "object")
    {
        return Err(ToolError::Validation(
            "tool schema root type must be 'object'".to_string(),
        ));
    }

    if let Some(required) = schema_object.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(ToolError::Validation(format!(
                    "missing required argument '{}'",
                    key
                )));
            }
        }
    }

    let properties = schema_object
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let additional_allowed = schema_object
        .get("additionalProperties")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    for (key, value) in object {
        let Some(property) = properties.get(key) else {
            if additional_allowed {
                continue;
            }
            return Err(ToolError::Validation(format!(
                "unexpected argument '{}' not allowed by schema",
                key
            )));
        };

        if let Some(type_name) = property.get("type").and_then(Value::as_str) {
            let is_valid = match type_name {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                "null" => value.is_null(),
                _ => true,
            };

            if !is_valid {
                return Err(ToolError::Validation(format!(
                    "argument '{}' expected type '{}' but received '{}'",
                    key,
                    type_name,
                    json_type_name(value)
                )));
            }
        }
    }

    Ok(())
}

pub(crate) fn format_line_numbered_content(content: &str, start_line: usize) -> String {
    if content.is_empty() {
        return String::new();
    }
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| format!("{} | {}", start_line + idx, line))
        .collect::<Vec<String>>()
        .join("\n")
}

fn json_type_name(value: &Value) -> &'static str {
    if value.is_null() {
        "null"
    } else if value.is_boolean() {
        "boolean"
    } else if value.is_string() {
        "string"
    } else if value.is_number() {
        "number"
    } else if value.is_array() {
        "array"
    } else {
        "object"
    }
}
