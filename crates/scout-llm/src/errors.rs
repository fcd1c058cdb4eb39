use thiserror::Error;

/// Top-level error type for the scout-llm crate.
///
/// Backend failures are fatal to the caller: the agent loop deliberately has
/// no retry policy, so these propagate unchanged.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
}
