use async_trait::async_trait;
use serde_json::Value;

use crate::errors::LlmError;
use crate::types::{Request, Response};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend contract consumed by the agent loop.
///
/// One call per loop step; no retry or backoff lives behind this trait.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: Request) -> Result<Response, LlmError>;
}

/// Anthropic Messages API adapter.
pub struct AnthropicBackend {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build from `ANTHROPIC_API_KEY`, honoring `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey)?;
        let mut backend = Self::new(api_key);
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            backend.base_url = base_url;
        }
        Ok(backend)
    }
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: Request) -> Result<Response, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        response
            .json::<Response>()
            .await
            .map_err(|error| LlmError::Decode(error.to_string()))
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
