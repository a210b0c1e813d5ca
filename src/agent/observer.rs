//! Hooks for watching an agent session while it works

use tracing::{info, warn};

use crate::tools::{ToolInvocation, ToolOutput, ToolStatus};

/// Receives progress notifications from a running session
///
/// Passed to the session at construction. All methods default to no-ops so
/// implementors pick what they care about.
pub trait AgentObserver: Send + Sync {
    /// A validated tool call is about to run
    fn on_tool_call(&self, _invocation: &ToolInvocation) {}

    /// A tool call finished (or was rejected before running)
    fn on_tool_result(&self, _name: &str, _output: &ToolOutput) {}

    /// Free-form status line (naming, retries, ...)
    fn on_status(&self, _message: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl AgentObserver for NoopObserver {}

/// Observer that forwards to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AgentObserver for TracingObserver {
    fn on_tool_call(&self, invocation: &ToolInvocation) {
        info!(
            tool = invocation.capability().name(),
            call_id = %invocation.id,
            argument = invocation.args.key_argument(),
            "Tool call"
        );
    }

    fn on_tool_result(&self, name: &str, output: &ToolOutput) {
        match output.status {
            ToolStatus::Success => info!(tool = name, bytes = output.content.len(), "Tool succeeded"),
            ToolStatus::Failed => warn!(tool = name, result = %output.content, "Tool failed"),
            ToolStatus::TimedOut => warn!(tool = name, "Tool timed out"),
        }
    }

    fn on_status(&self, message: &str) {
        info!("{}", message);
    }
}
