use scout_llm::ToolDefinition;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;

use crate::config::{EditMode, SettingsHandle};
use crate::errors::ToolError;
use crate::events::{AgentEvent, ConfirmationRequest, EventBus};
use crate::workspace::Workspace;

use super::{
    TEXT_EDITOR_TOOL, Tool, format_line_numbered_content, optional_usize_argument,
    required_string_argument,
};

pub fn text_editor_tool(workspace: Workspace, bus: EventBus, settings: SettingsHandle) -> Tool {
    Tool {
        definition: ToolDefinition {
            name: TEXT_EDITOR_TOOL.to_string(),
            description: "View and edit workspace files. Commands: 'view', 'create', 'str_replace' (old_str must match exactly once), 'insert' (after insert_line, 0 prepends).".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["command", "path"],
                "properties": {
                    "command": { "type": "string" },
                    "path": { "type": "string" },
                    "file_text": { "type": "string" },
                    "old_str": { "type": "string" },
                    "new_str": { "type": "string" },
                    "insert_line": { "type": "integer" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let workspace = workspace.clone();
            let bus = bus.clone();
            let settings = settings.clone();
            Box::pin(async move {
                let command = required_string_argument(&input, "command")?;
                let path = required_string_argument(&input, "path")?;
                let resolved = workspace.resolve(&path)?;

                match command.as_str() {
                    "view" => view(&bus, &path, &resolved).await,
                    "create" => {
                        let file_text = required_string_argument(&input, "file_text")?;
                        guard_edit(&bus, &settings, &path, "create", &file_text)?;
                        create(&path, &resolved, &file_text).await
                    }
                    "str_replace" => {
                        let old_str = required_string_argument(&input, "old_str")?;
                        let new_str = required_string_argument(&input, "new_str")?;
                        let preview = format!("- {old_str}\n+ {new_str}");
                        guard_edit(&bus, &settings, &path, "str_replace", &preview)?;
                        str_replace(&path, &resolved, &old_str, &new_str).await
                    }
                    "insert" => {
                        let insert_line =
                            optional_usize_argument(&input, "insert_line")?.ok_or_else(|| {
                                ToolError::Validation(
                                    "missing required argument 'insert_line'".to_string(),
                                )
                            })?;
                        let new_str = required_string_argument(&input, "new_str")?;
                        let preview = format!("insert after line {insert_line}:\n+ {new_str}");
                        guard_edit(&bus, &settings, &path, "insert", &preview)?;
                        insert(&path, &resolved, insert_line, &new_str).await
                    }
                    other => Err(ToolError::Validation(format!(
                        "unknown command '{other}' (expected view, create, str_replace, or insert)"
                    ))),
                }
            })
        }),
    }
}

/// Enforce the edit policy for a mutating command.
///
/// `Never` refuses outright (the agent stops offering this tool in that
/// mode, but a stale call must still be refused here); `Ask` routes through
/// the confirmation slot; `Always` proceeds.
fn guard_edit(
    bus: &EventBus,
    settings: &SettingsHandle,
    path: &str,
    action: &str,
    preview: &str,
) -> Result<(), ToolError> {
    match settings.edit_mode() {
        EditMode::Never => Err(ToolError::Rejected(
            "file editing is disabled by the current edit mode".to_string(),
        )),
        EditMode::Always => Ok(()),
        EditMode::Ask => {
            let decision = bus.request_confirmation(&ConfirmationRequest {
                tool_name: TEXT_EDITOR_TOOL.to_string(),
                action: action.to_string(),
                path: Some(path.to_string()),
                preview: preview.to_string(),
            });
            if decision.approved {
                Ok(())
            } else {
                Err(ToolError::Rejected(
                    decision.reason.unwrap_or_else(|| "edit declined".to_string()),
                ))
            }
        }
    }
}

async fn view(bus: &EventBus, path: &str, resolved: &Path) -> Result<Value, ToolError> {
    let content = tokio::fs::read_to_string(resolved)
        .await
        .map_err(|error| ToolError::Execution(format!("cannot read '{}': {}", path, error)))?;
    bus.emit(AgentEvent::FileViewed {
        path: path.to_string(),
    });
    Ok(Value::String(format_line_numbered_content(&content, 1)))
}

async fn create(path: &str, resolved: &Path, file_text: &str) -> Result<Value, ToolError> {
    if let Some(parent) = resolved.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(resolved, file_text).await?;
    Ok(Value::String(format!("Created {path}")))
}

async fn str_replace(
    path: &str,
    resolved: &Path,
    old_str: &str,
    new_str: &str,
) -> Result<Value, ToolError> {
    if old_str.is_empty() {
        return Err(ToolError::Validation("old_str must not be empty".to_string()));
    }

    let content = tokio::fs::read_to_string(resolved)
        .await
        .map_err(|error| ToolError::Execution(format!("cannot read '{}': {}", path, error)))?;

    let occurrences = content.matches(old_str).count();
    if occurrences == 0 {
        return Err(ToolError::Execution(format!(
            "old_str not found in {path}"
        )));
    }
    if occurrences > 1 {
        return Err(ToolError::Execution(format!(
            "old_str appears {occurrences} times in {path}; it must appear exactly once"
        )));
    }

    let updated = content.replacen(old_str, new_str, 1);
    tokio::fs::write(resolved, updated).await?;
    Ok(Value::String(format!("Updated {path}")))
}

async fn insert(
    path: &str,
    resolved: &Path,
    insert_line: usize,
    new_str: &str,
) -> Result<Value, ToolError> {
    let content = tokio::fs::read_to_string(resolved)
        .await
        .map_err(|error| ToolError::Execution(format!("cannot read '{}': {}", path, error)))?;

    let mut lines: Vec<&str> = content.lines().collect();
    if insert_line > lines.len() {
        return Err(ToolError::Validation(format!(
            "insert_line {insert_line} is past the end of {path} ({} lines)",
            lines.len()
        )));
    }

    lines.insert(insert_line, new_str);
    let mut updated = lines.join("\n");
    if content.ends_with('\n') {
        updated.push('\n');
    }
    tokio::fs::write(resolved, updated).await?;
    Ok(Value::String(format!(
        "Inserted into {path} after line {insert_line}"
    )))
}
