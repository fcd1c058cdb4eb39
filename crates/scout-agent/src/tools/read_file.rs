use scout_llm::ToolDefinition;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::errors::ToolError;
use crate::events::{AgentEvent, EventBus};
use crate::workspace::Workspace;

use super::{
    READ_FILE_TOOL, Tool, format_line_numbered_content, optional_usize_argument,
    required_string_argument,
};

pub fn read_file_tool(workspace: Workspace, bus: EventBus) -> Tool {
    Tool {
        definition: ToolDefinition {
            name: READ_FILE_TOOL.to_string(),
            description: "Read a file inside the workspace. Returns line-numbered content."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": { "type": "string" },
                    "offset": { "type": "integer" },
                    "limit": { "type": "integer" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let workspace = workspace.clone();
            let bus = bus.clone();
            Box::pin(async move {
                let path = required_string_argument(&input, "path")?;
                let offset = optional_usize_argument(&input, "offset")?;
                let limit = optional_usize_argument(&input, "limit")?;

                let resolved = workspace.resolve(&path)?;
                let content = tokio::fs::read_to_string(&resolved)
                    .await
                    .map_err(|error| {
                        ToolError::Execution(format!("cannot read '{}': {}", path, error))
                    })?;

                let start = offset.unwrap_or(1).max(1);
                let window: String = match limit {
                    Some(limit) => content
                        .lines()
                        .skip(start - 1)
                        .take(limit)
                        .collect::<Vec<_>>()
                        .join("\n"),
                    None => content.lines().skip(start - 1).collect::<Vec<_>>().join("\n"),
                };

                bus.emit(AgentEvent::FileViewed { path: path.clone() });
                Ok(Value::String(format_line_numbered_content(&window, start)))
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Tool) {
        let dir = tempfile::tempdir().unwrap();
        let tool = read_file_tool(Workspace::new(dir.path()), EventBus::new());
        (dir, tool)
    }

    #[tokio::test]
    async fn reads_with_line_numbers() {
        let (dir, tool) = setup();
        std::fs::write(dir.path().join("f.txt"), "alpha\nbeta\n").unwrap();

        let result = tool
            .dispatch(&EventBus::new(), json!({ "path": "f.txt" }))
            .await;
        assert!(result.success);
        assert_eq!(
            result.data,
            Some(Value::String("1 | alpha\n2 | beta".to_string()))
        );
    }

    #[tokio::test]
    async fn offset_and_limit_window_the_content() {
        let (dir, tool) = setup();
        std::fs::write(dir.path().join("f.txt"), "a\nb\nc\nd\n").unwrap();

        let result = tool
            .dispatch(
                &EventBus::new(),
                json!({ "path": "f.txt", "offset": 2, "limit": 2 }),
            )
            .await;
        assert_eq!(result.data, Some(Value::String("2 | b\n3 | c".to_string())));
    }

    #[tokio::test]
    async fn missing_file_is_a_soft_failure() {
        let (_dir, tool) = setup();
        let result = tool
            .dispatch(&EventBus::new(), json!({ "path": "absent.txt" }))
            .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn path_outside_workspace_is_rejected() {
        let (_dir, tool) = setup();
        let result = tool
            .dispatch(&EventBus::new(), json!({ "path": "../escape.txt" }))
            .await;
        assert!(result.is_error());
        assert!(
            result
                .error
                .as_deref()
                .unwrap_or_default()
                .contains("outside the workspace")
        );
    }
}
