use scout_llm::ToolDefinition;
use serde_json::json;
use std::sync::Arc;

use crate::errors::ToolError;
use crate::events::{AgentEvent, EventBus};
use crate::todo::{Todo, TodoStore};

use super::{Tool, WRITE_TODOS_TOOL};

pub fn write_todos_tool(store: TodoStore, bus: EventBus) -> Tool {
    Tool {
        definition: ToolDefinition {
            name: WRITE_TODOS_TOOL.to_string(),
            description: "Replace the task list. Send the complete list every time; omitted items are dropped.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["todos"],
                "properties": {
                    "todos": { "type": "array" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let store = store.clone();
            let bus = bus.clone();
            Box::pin(async move {
                let todos: Vec<Todo> = serde_json::from_value(
                    input.get("todos").cloned().unwrap_or(json!([])),
                )
                .map_err(|error| {
                    ToolError::Validation(format!("malformed todo list: {error}"))
                })?;

                store.replace(todos.clone());
                bus.emit(AgentEvent::TodosUpdated {
                    todos: todos.clone(),
                });
                Ok(json!({ "count": todos.len() }))
            })
        }),
    }
}
