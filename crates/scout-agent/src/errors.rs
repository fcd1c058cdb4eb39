use thiserror::Error;

/// Top-level error type for the scout-agent crate.
///
/// Only backend failures and internal contract violations surface here; tool
/// failures are contained at the dispatch boundary and reported back to the
/// model as failed tool results.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Backend(#[from] scout_llm::LlmError),
    #[error("iteration budget exhausted without a final answer; forcing the output tool must always produce one")]
    BudgetExhausted,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Error type returned by tool executors.
///
/// Every variant is contained by `Tool::dispatch` and converted into a
/// failed `ToolResult`; executors never abort the agent loop.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0}")]
    Execution(String),
    #[error("not approved: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for ToolError {
    fn from(error: std::io::Error) -> Self {
        ToolError::Execution(error.to_string())
    }
}
