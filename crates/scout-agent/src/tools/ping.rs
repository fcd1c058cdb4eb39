use scout_llm::ToolDefinition;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::errors::ToolError;

use super::{PING_TOOL, Tool, required_string_argument};

const PING_COUNT: &str = "5";
const PING_TIMEOUT: Duration = Duration::from_secs(10);

pub fn ping_tool() -> Tool {
    ping_tool_with("ping", PING_TIMEOUT)
}

fn ping_tool_with(program: &str, wait: Duration) -> Tool {
    let program = program.to_string();
    Tool {
        definition: ToolDefinition {
            name: PING_TOOL.to_string(),
            description: "Ping a host five times and return the combined output.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let program = program.clone();
            Box::pin(async move {
                let url = required_string_argument(&input, "url")?;

                let run = Command::new(&program)
                    .args(["-c", PING_COUNT, &url])
                    .kill_on_drop(true)
                    .output();
                let output = tokio::time::timeout(wait, run).await.map_err(|_| {
                    ToolError::Execution(format!(
                        "ping timed out after {} seconds",
                        wait.as_secs_f32()
                    ))
                })??;

                // An unreachable host still prints statistics, so the exit
                // status is not checked.
                let mut response = String::from_utf8_lossy(&output.stdout).into_owned();
                response.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(Value::String(response))
            })
        }),
    }
}
