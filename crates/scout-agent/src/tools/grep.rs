use regex::RegexBuilder;
use scout_llm::ToolDefinition;
use serde_json::{Value, json};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::errors::ToolError;
use crate::workspace::Workspace;

use super::{
    GREP_TOOL, Tool, optional_bool_argument, optional_string_argument, optional_usize_argument,
    required_string_argument,
};

const DEFAULT_MAX_RESULTS: usize = 200;

pub fn grep_tool(workspace: Workspace) -> Tool {
    Tool {
        definition: ToolDefinition {
            name: GREP_TOOL.to_string(),
            description:
                "Search workspace file contents with a regular expression. Returns path:line matches."
                    .to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["pattern"],
                "properties": {
                    "pattern": { "type": "string" },
                    "path": { "type": "string" },
                    "case_insensitive": { "type": "boolean" },
                    "max_results": { "type": "integer" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let workspace = workspace.clone();
            Box::pin(async move {
                let pattern = required_string_argument(&input, "pattern")?;
                let base = optional_string_argument(&input, "path")?.unwrap_or(".".to_string());
                let case_insensitive =
                    optional_bool_argument(&input, "case_insensitive")?.unwrap_or(false);
                let max_results =
                    optional_usize_argument(&input, "max_results")?.unwrap_or(DEFAULT_MAX_RESULTS);

                let base = workspace.resolve(&base)?;
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(case_insensitive)
                    .build()
                    .map_err(|error| {
                        ToolError::Validation(format!("invalid regex pattern: {error}"))
                    })?;

                let mut lines = Vec::new();
                'walk: for entry in WalkDir::new(&base)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|entry| entry.file_name() != ".git")
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                {
                    // Binary files fail the UTF-8 read and are skipped.
                    let Ok(content) = std::fs::read_to_string(entry.path()) else {
                        continue;
                    };
                    let display = entry
                        .path()
                        .strip_prefix(workspace.root())
                        .unwrap_or(entry.path())
                        .display()
                        .to_string();
                    for (index, line) in content.lines().enumerate() {
                        if regex.is_match(line) {
                            lines.push(format!("{}:{}: {}", display, index + 1, line));
                            if lines.len() >= max_results {
                                break 'walk;
                            }
                        }
                    }
                }

                if lines.is_empty() {
                    Ok(Value::String("No matches found".to_string()))
                } else {
                    Ok(Value::String(lines.join("\n")))
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
    async fn matches_carry_path_and_line_number() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "alpha\nneedle here\n").unwrap();

        let tool = grep_tool(Workspace::new(dir.path()));
        let result = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "needle" }))
            .await;
        assert!(result.success);
        assert_eq!(
            result.data,
            Some(Value::String("notes.txt:2: needle here".to_string()))
        );
    }

    #[tokio::test]
    async fn case_insensitive_flag_widens_the_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "NEEDLE\n").unwrap();

        let tool = grep_tool(Workspace::new(dir.path()));
        let miss = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "needle" }))
            .await;
        assert_eq!(miss.data, Some(Value::String("No matches found".to_string())));

        let hit = tool
            .dispatch(
                &EventBus::new(),
                json!({ "pattern": "needle", "case_insensitive": true }),
            )
            .await;
        assert_eq!(hit.data, Some(Value::String("f.txt:1: NEEDLE".to_string())));
    }

    #[tokio::test]
    async fn invalid_regex_is_a_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = grep_tool(Workspace::new(dir.path()));
        let result = tool
            .dispatch(&EventBus::new(), json!({ "pattern": "[unclosed" }))
            .await;
        assert!(result.is_error());
        assert!(
            result
                .error
                .as_deref()
                .unwrap_or_default()
                .contains("invalid regex")
        );
    }
}
