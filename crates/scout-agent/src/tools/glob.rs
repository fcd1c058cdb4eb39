use scout_llm::ToolDefinition;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::errors::ToolError;
use crate::workspace::Workspace;

use super::{GLOB_TOOL, Tool, optional_string_argument, required_string_argument};

pub fn glob_tool(workspace: Workspace) -> Tool {
    Tool {
        definition: ToolDefinition {
            name: GLOB_TOOL.to_string(),
            description: "Find workspace files matching a glob pattern, e.g. 'src/**/*.rs'."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["pattern"],
                "properties": {
                    "pattern": { "type": "string" },
                    "path": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let workspace = workspace.clone();
            Box::pin(async move {
                let pattern = required_string_argument(&input, "pattern")?;
                let base = optional_string_argument(&input, "path")?.unwrap_or(".".to_string());
                let base = workspace.resolve(&base)?;

                let full_pattern = base.join(&pattern);
                let full_pattern = full_pattern.to_str().ok_or_else(|| {
                    ToolError::Validation("pattern is not valid UTF-8".to_string())
                })?;

                let entries = glob::glob(full_pattern).map_err(|error| {
                    ToolError::Validation(format!("invalid glob pattern: {error}"))
                })?;

                // The raw pattern may climb out of the base with `..` or an
                // absolute prefix; every match must re-pass confinement.
                let mut matches: Vec<String> = entries
                    .filter_map(Result::ok)
                    .filter_map(|path| workspace.resolve(&path).ok())
                    .map(|path| {
                        let relative = path.strip_prefix(workspace.root()).unwrap_or(&path);
                        if relative.as_os_str().is_empty() {
                            ".".to_string()
                        } else {
                            relative.display().to_string()
                        }
                    })
                    .collect();
                matches.sort_unstable();

                if matches.is_empty() {
                    Ok(Value::String("No files matched".to_string()))
                } else {
                    Ok(Value::String(matches.join("\n")))
                }
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;

    #[tokio::test]
    async fn matches_are_workspace_relative_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/b.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/c.txt"), "").unwrap();

        let tool = glob_tool(Workspace::new(dir.path()));
        let result = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "src/*.rs" }))
            .await;
        assert!(result.success);
        assert_eq!(
            result.data,
            Some(Value::String("src/a.rs\nsrc/b.rs".to_string()))
        );
    }

    #[tokio::test]
    async fn matches_outside_the_root_are_dropped() {
        let outer = tempfile::tempdir().unwrap();
        let project = outer.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "hidden").unwrap();
        std::fs::write(project.join("open.txt"), "visible").unwrap();

        let tool = glob_tool(Workspace::new(&project));

        // `../*` still matches the root directory itself, so the result may
        // name `.`; the sibling file must never appear.
        let escape = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "../*" }))
            .await;
        assert!(escape.success);
        assert!(!escape.content().contains("secret"));

        let absolute = tool
            .dispatch(
                &EventBus::new(),
                json!({ "pattern": format!("{}/*", outer.path().display()) }),
            )
            .await;
        assert!(absolute.success);
        assert!(!absolute.content().contains("secret"));

        let inside = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "*.txt" }))
            .await;
        assert_eq!(inside.data, Some(Value::String("open.txt".to_string())));
    }

    #[tokio::test]
    async fn no_matches_reports_plainly() {
        let dir = tempfile::tempdir().unwrap();
        let tool = glob_tool(Workspace::new(dir.path()));
        let result = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "*.zig" }))
            .await;
        assert_eq!(result.data, Some(Value::String("No files matched".to_string())));
    }
}
