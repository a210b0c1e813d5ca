//! Chat messages, tool schemas and the backend seam
//!
//! These types follow the OpenAI-compatible `/chat/completions` shape that
//! Mistral and most hosted providers accept, so a `ChatMessage` can be
//! replayed to the backend verbatim on every turn.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the call this message answers (tool results only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Capability name (tool results only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message that requests one or more tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Result of a tool call, matched to the request by `tool_call_id`
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// A tool call from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.to_string(),
            },
        }
    }
}

/// Function call details
///
/// `arguments` is kept as JSON text, which is what the backend expects when
/// the call is replayed. Providers that send an object instead are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, deserialize_with = "arguments_as_text")]
    pub arguments: String,
}

/// Tool definition for the model
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // Always "function"
    pub function: ToolFunction,
}

/// Function specification for a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value, // JSON Schema
}

/// Token counts reported by the backend for one or more round trips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// What the model produced in one round trip
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Final answer, no further tool use requested
    Text(String),
    /// Request to run one or more tools before continuing
    ToolCalls {
        /// Text the model emitted alongside the calls (often empty)
        content: String,
        calls: Vec<ToolCall>,
    },
}

/// One backend response together with its token accounting
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub reply: ModelReply,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>, usage: Usage) -> Self {
        Self {
            reply: ModelReply::Text(content.into()),
            usage,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>, usage: Usage) -> Self {
        Self {
            reply: ModelReply::ToolCalls {
                content: String::new(),
                calls,
            },
            usage,
        }
    }
}

/// Error type for chat operations
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Empty response from model backend")]
    EmptyResponse,
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl ChatError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::Request(e) => e.is_timeout() || e.is_connect(),
            ChatError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A remote model that accepts a conversation plus a tool schema
///
/// Implementations must be stateless with respect to the conversation: the
/// caller always sends the full ordered history.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier, used for logging
    fn model(&self) -> &str;

    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Tool],
    ) -> Result<ModelResponse, ChatError>;
}

fn function_type() -> String {
    "function".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn arguments_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => "{}".to_string(),
        other => other.to_string(),
    })
}
