use scout_llm::ToolDefinition;
use serde_json::json;
use std::sync::Arc;

use super::{OUTPUT_TOOL, Tool, required_string_argument};

/// The terminal tool: invoking it ends the run with `result` as the final
/// answer. It is held by the agent itself rather than the registry so it is
/// always resolvable, even when the registry is empty.
pub fn output_tool() -> Tool {
    Tool {
        definition: ToolDefinition {
            name: OUTPUT_TOOL.to_string(),
            description: "Report the final answer for the task. Call this exactly once, when the task is complete.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["result"],
                "properties": {
                    "result": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(|input| {
            Box::pin(async move {
                let result = required_string_argument(&input, "result")?;
                Ok(json!({ "result": result }))
            })
        }),
    }
}
