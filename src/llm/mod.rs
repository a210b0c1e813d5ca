//! LLM backend integration module
//!
//! `tool_use` holds the conversation and tool-schema types together with the
//! [`ChatBackend`] trait the agent talks to; `client` is the HTTP backend.

pub mod client;
pub mod tool_use;

pub use client::{ChatClient, ClientConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use tool_use::{
    ChatBackend, ChatError, ChatMessage, FunctionCall, ModelReply, ModelResponse, Role, Tool,
    ToolCall, ToolFunction, Usage,
};
