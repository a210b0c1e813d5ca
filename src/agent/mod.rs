//! Agent module for LLM-driven app building
//!
//! This module provides the agent loop that orchestrates:
//! - a chat-completions backend with tool calling
//! - the capability toolset scoped to one app directory
//! - conversation history and token accounting across tasks
//!
//! # Architecture
//!
//! ```text
//! User Prompt → AgentSession.run_task(prompt, app_dir)
//!                  ↓
//!           ChatBackend.chat(system + history + turn, tools)
//!                  ↓
//!           Tool calls? ──yes──→ Toolset.invoke() per call (keyed by call id)
//!                  │                    ↓
//!                  │             results appended to the turn → resubmit
//!                  no
//!                  ↓
//!           Commit turn to history, add usage → final text
//! ```

pub mod controller;
pub mod history;
pub mod naming;
pub mod observer;

pub use controller::{
    AgentConfig, AgentError, AgentSession, TaskOutcome, ToolCallRecord,
    DEFAULT_AGENT_SYSTEM_PROMPT, DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_TOOL_ROUNDS,
};
pub use history::{ConversationState, UsageCounters};
pub use naming::{clean_short_name, NamingAssistant};
pub use observer::{AgentObserver, NoopObserver, TracingObserver};
