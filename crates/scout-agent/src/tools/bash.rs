use scout_llm::ToolDefinition;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::ToolError;
use crate::events::{ConfirmationRequest, EventBus};
use crate::shell::ShellSession;

use super::{
    BASH_TOOL, Tool, optional_bool_argument, optional_string_argument, optional_u64_argument,
};

/// Shell tool backed by one persistent session.
///
/// The session is created lazily on first use and owned exclusively by this
/// tool instance. Commands require confirmation through the bus before they
/// run; `restart` tears the session down and recreates it.
pub fn bash_tool(bus: EventBus) -> Tool {
    let session: Arc<Mutex<Option<ShellSession>>> = Arc::new(Mutex::new(None));

    Tool {
        definition: ToolDefinition {
            name: BASH_TOOL.to_string(),
            description: "Run a command in a persistent bash session. Working directory and shell state carry over between calls. Pass restart=true to reset the session.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string" },
                    "restart": { "type": "boolean" },
                    "timeout_secs": { "type": "integer" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let bus = bus.clone();
            let session = session.clone();
            Box::pin(async move {
                let restart = optional_bool_argument(&input, "restart")?.unwrap_or(false);
                let command = optional_string_argument(&input, "command")?;
                let wait = optional_u64_argument(&input, "timeout_secs")?.map(Duration::from_secs);

                let mut guard = session.lock().await;

                if restart {
                    if let Some(existing) = guard.as_mut() {
                        existing.restart().await?;
                    }
                    if command.is_none() {
                        return Ok(Value::String("shell session restarted".to_string()));
                    }
                }

                let Some(command) = command else {
                    return Err(ToolError::Validation(
                        "missing required argument 'command' (or pass restart=true)".to_string(),
                    ));
                };

                let decision = bus.request_confirmation(&ConfirmationRequest {
                    tool_name: BASH_TOOL.to_string(),
                    action: "execute".to_string(),
                    path: None,
                    preview: command.clone(),
                });
                if !decision.approved {
                    return Err(ToolError::Rejected(
                        decision
                            .reason
                            .unwrap_or_else(|| "command declined".to_string()),
                    ));
                }

                if guard.is_none() {
                    *guard = Some(ShellSession::spawn()?);
                }
                let output = guard
                    .as_mut()
                    .expect("session was just created")
                    .execute(&command, wait)
                    .await?;

                Ok(json!({
                    "stdout": output.stdout,
                    "stderr": output.stderr,
                }))
            })
        }),
    }
}
