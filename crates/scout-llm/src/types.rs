use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One search hit inside a `web_search_tool_result` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResult {
    #[serde(rename = "type", default = "web_search_result_tag")]
    pub kind: String,
    pub title: String,
    pub url: String,
    pub encrypted_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_age: Option<String>,
}

fn web_search_result_tag() -> String {
    "web_search_result".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebSearchToolError {
    #[serde(rename = "type", default = "web_search_error_tag")]
    pub kind: String,
    pub error_code: String,
}

fn web_search_error_tag() -> String {
    "web_search_tool_result_error".to_string()
}

/// The server returns either a list of results or a single error object in
/// the `content` field of a web search block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WebSearchToolContent {
    Results(Vec<WebSearchResult>),
    Error(WebSearchToolError),
}

/// One typed piece of conversational content.
///
/// The variant set is closed on purpose: the backend may introduce block
/// kinds this crate has never heard of, and those deserialize into
/// [`ContentBlock::Unrecognized`] rather than failing the whole response.
/// Unrecognized blocks serialize back as their raw wire value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Thinking {
        thinking: String,
        signature: String,
    },
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    ServerToolUse {
        id: String,
        name: String,
        input: Value,
    },
    WebSearchToolResult {
        tool_use_id: String,
        content: WebSearchToolContent,
    },
    #[serde(untagged)]
    Unrecognized(Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// The wire-level `type` tag, best-effort for unrecognized blocks.
    pub fn type_name(&self) -> String {
        match self {
            ContentBlock::Thinking { .. } => "thinking".to_string(),
            ContentBlock::Text { .. } => "text".to_string(),
            ContentBlock::ToolUse { .. } => "tool_use".to_string(),
            ContentBlock::ToolResult { .. } => "tool_result".to_string(),
            ContentBlock::ServerToolUse { .. } => "server_tool_use".to_string(),
            ContentBlock::WebSearchToolResult { .. } => "web_search_tool_result".to_string(),
            ContentBlock::Unrecognized(raw) => raw
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

/// One role-tagged group of content blocks, appended atomically to history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    Tool { name: String },
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThinkingConfig {
    Enabled { budget_tokens: u32 },
    Disabled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}
