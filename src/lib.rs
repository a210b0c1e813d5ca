//! QuickApp - an LLM agent that scaffolds web apps from plain-language requests
//!
//! The agent works inside one app directory per task, using a small set of
//! filesystem and shell capabilities, and keeps its conversation across tasks
//! so follow-up requests can refine the same app.
//!
//! # Modules
//!
//! - `llm` - chat-completions backend trait, wire types and HTTP client
//! - `tools` - capability table, argument validation and execution
//! - `agent` - task loop, conversation history, app naming
//! - `cli` - interactive shell and terminal rendering
//! - `tracing` - logging and OpenTelemetry setup
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quickapp::{AgentConfig, AgentSession, ChatClient, ClientConfig};
//!
//! let client = ChatClient::new(ClientConfig::new(api_key))?;
//! let mut session = AgentSession::new(Arc::new(client), AgentConfig::default());
//! let outcome = session.run_task("Build a todo list app", "apps/todo_3fa").await?;
//! println!("{}", outcome.final_response);
//! ```

pub mod agent;
pub mod cli;
pub mod llm;
pub mod tools;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{AgentConfig, AgentError, AgentSession, TaskOutcome};
pub use llm::{ChatBackend, ChatClient, ChatError, ClientConfig};
pub use tools::{ToolLimits, ToolOutput, ToolStatus, Toolset, WorkingDir};
