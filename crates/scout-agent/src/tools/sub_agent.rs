use scout_llm::ToolDefinition;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::agent::Agent;
use crate::errors::ToolError;

use super::{SUB_AGENT_TOOL, Tool, required_string_argument};

/// Shape of a delegated agent; the factory maps each flavor to a tool set,
/// model, and system prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubAgentFlavor {
    Explore,
    Plan,
}

impl SubAgentFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAgentFlavor::Explore => "explore",
            SubAgentFlavor::Plan => "plan",
        }
    }
}

impl fmt::Display for SubAgentFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubAgentFlavor {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "explore" => Ok(SubAgentFlavor::Explore),
            "plan" => Ok(SubAgentFlavor::Plan),
            other => Err(format!(
                "unrecognized flavor '{other}' (expected explore or plan)"
            )),
        }
    }
}

/// Builds the nested agent for a delegation request.
///
/// `depth` is the nesting level of the agent being built (the top level is
/// 0); `max_depth` bounds how deep delegation may recurse.
pub trait AgentFactory: Send + Sync {
    fn build(&self, flavor: SubAgentFlavor, depth: usize) -> Result<Agent, ToolError>;

    fn max_depth(&self) -> usize {
        2
    }
}

pub fn sub_agent_tool(factory: Arc<dyn AgentFactory>, depth: usize) -> Tool {
    Tool {
        definition: ToolDefinition {
            name: SUB_AGENT_TOOL.to_string(),
            description: "Delegate a self-contained task to a nested agent. Flavors: 'explore' (read-only investigation), 'plan' (produce a plan). Returns the nested agent's final answer.".to_string(),
            input_schema: json!({
                "type": "object",
                "required": ["flavor", "prompt"],
                "properties": {
                    "flavor": { "type": "string" },
                    "prompt": { "type": "string" }
                },
                "additionalProperties": false
            }),
        },
        executor: Arc::new(move |input| {
            let factory = factory.clone();
            Box::pin(async move {
                let flavor = required_string_argument(&input, "flavor")?;
                let prompt = required_string_argument(&input, "prompt")?;

                let flavor: SubAgentFlavor = flavor
                    .parse()
                    .map_err(ToolError::Validation)?;

                let child_depth = depth + 1;
                if child_depth > factory.max_depth() {
                    return Err(ToolError::Execution(format!(
                        "delegation depth limit reached ({})",
                        factory.max_depth()
                    )));
                }

                // The factory hands the nested agent the same bus, so its
                // activity is observable identically to top-level activity.
                let mut agent = factory.build(flavor, child_depth)?;
                let answer = agent
                    .run(&prompt, None)
                    .await
                    .map_err(|error| ToolError::Execution(error.to_string()))?;

                Ok(json!({ "result": answer }))
            })
        }),
    }
}
