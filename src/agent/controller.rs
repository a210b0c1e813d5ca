//! Agent Session - main orchestration loop for LLM-driven app building
//!
//! The session alternates between the model backend and the [`Toolset`]
//! until the model answers without requesting tools. A turn is committed to
//! the conversation only once it completes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::history::{ConversationState, UsageCounters};
use super::naming::NamingAssistant;
use super::observer::{AgentObserver, TracingObserver};
use crate::llm::{ChatBackend, ChatError, ChatMessage, ModelReply, ToolCall, Usage};
use crate::tools::{ToolInvocation, ToolLimits, ToolOutput, ToolStatus, Toolset, WorkingDir};

/// Default cap on tool-call rounds within one task
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 50;

/// Default context window reported by [`AgentSession::context_usage`]
pub const DEFAULT_CONTEXT_WINDOW: u64 = 32_000;

/// Configuration for the agent session
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Custom system prompt (uses default if None)
    pub system_prompt: Option<String>,
    /// Maximum tool-call rounds before a task is abandoned
    pub max_tool_rounds: usize,
    /// Context window size used for usage reporting
    pub context_window: u64,
    /// Timeouts and output caps for capability calls
    pub tool_limits: ToolLimits,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            context_window: DEFAULT_CONTEXT_WINDOW,
            tool_limits: ToolLimits::default(),
        }
    }
}

/// Result of a completed task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Final response from the LLM
    pub final_response: String,
    /// Number of tool-call rounds in this turn
    pub tool_rounds: usize,
    /// Records of every tool call, in execution order
    pub tool_calls: Vec<ToolCallRecord>,
    /// Tokens reported by the backend across the whole turn
    pub usage: Usage,
    /// Unique trace ID for this task
    pub trace_id: String,
}

/// Record of a single tool call
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Backend-assigned call id
    pub call_id: String,
    /// Capability name as requested by the model
    pub name: String,
    /// Argument shown in logs (empty if the call was rejected)
    pub key_argument: String,
    pub status: ToolStatus,
    pub duration_ms: f64,
}

/// Error type for agent operations
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Maximum tool rounds reached without a final answer
    #[error("Maximum of {0} tool rounds reached without a final answer")]
    MaxToolRoundsReached(usize),
    /// The working directory is missing or not a directory
    #[error("Working directory is not accessible: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),
    /// Model backend error
    #[error("Model backend error: {0}")]
    Backend(#[from] ChatError),
}

/// Messages and outcome of a turn that has not been committed yet
struct CompletedTurn {
    messages: Vec<ChatMessage>,
    outcome: TaskOutcome,
}

/// Agent session owning the conversation with one model backend
pub struct AgentSession {
    backend: Arc<dyn ChatBackend>,
    toolset: Toolset,
    config: AgentConfig,
    state: ConversationState,
    observer: Arc<dyn AgentObserver>,
}

impl AgentSession {
    /// Create a new session that reports through `tracing`
    pub fn new(backend: Arc<dyn ChatBackend>, config: AgentConfig) -> Self {
        Self::with_observer(backend, config, Arc::new(TracingObserver))
    }

    /// Create a new session with a custom observer
    pub fn with_observer(
        backend: Arc<dyn ChatBackend>,
        config: AgentConfig,
        observer: Arc<dyn AgentObserver>,
    ) -> Self {
        let toolset = Toolset::new(config.tool_limits.clone());
        Self {
            backend,
            toolset,
            config,
            state: ConversationState::new(),
            observer,
        }
    }

    fn system_prompt(&self) -> &str {
        self.config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_AGENT_SYSTEM_PROMPT)
    }

    /// Run one task inside `working_dir`
    ///
    /// On success the whole exchange is appended to the history and the
    /// turn's usage is added to the counters. On failure neither changes.
    pub async fn run_task(
        &mut self,
        prompt: &str,
        working_dir: impl AsRef<Path>,
    ) -> Result<TaskOutcome, AgentError> {
        let root = working_dir.as_ref().to_path_buf();
        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(AgentError::InvalidWorkingDirectory(root)),
        }
        let dir = WorkingDir::new(root);

        let trace_id = Uuid::now_v7().to_string();
        let root_span = info_span!(
            "agent_task",
            trace_id = %trace_id,
            model = %self.backend.model(),
            app_dir = %dir.root().display(),
            otel.name = "agent_task"
        );

        let turn = self
            .run_turn(prompt, &dir, &trace_id)
            .instrument(root_span)
            .await?;

        self.state.append_turn(turn.messages, turn.outcome.usage);
        Ok(turn.outcome)
    }

    async fn run_turn(
        &self,
        prompt: &str,
        dir: &WorkingDir,
        trace_id: &str,
    ) -> Result<CompletedTurn, AgentError> {
        info!(history = self.state.len(), "Starting agent task");

        let system = ChatMessage::system(self.system_prompt());
        let mut turn = vec![ChatMessage::user(prompt)];
        let mut usage = Usage::default();
        let mut rounds = 0;
        let mut records = Vec::new();

        loop {
            let request: Vec<ChatMessage> = std::iter::once(system.clone())
                .chain(self.state.messages().iter().cloned())
                .chain(turn.iter().cloned())
                .collect();

            let llm_span = info_span!("llm_call", round = rounds + 1, otel.name = "llm_call");
            let call_start = Instant::now();

            let response = match self
                .backend
                .chat(&request, self.toolset.definitions())
                .instrument(llm_span)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, round = rounds + 1, "Backend call failed, abandoning turn");
                    return Err(e.into());
                }
            };

            debug!(
                round = rounds + 1,
                duration_ms = call_start.elapsed().as_secs_f64() * 1000.0,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "LLM call completed"
            );
            usage += response.usage;

            match response.reply {
                ModelReply::Text(text) => {
                    info!(
                        rounds,
                        tool_calls = records.len(),
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Agent task completed"
                    );
                    turn.push(ChatMessage::assistant(text.clone()));
                    return Ok(CompletedTurn {
                        messages: turn,
                        outcome: TaskOutcome {
                            final_response: text,
                            tool_rounds: rounds,
                            tool_calls: records,
                            usage,
                            trace_id: trace_id.to_string(),
                        },
                    });
                }
                ModelReply::ToolCalls { content, calls } => {
                    rounds += 1;
                    if rounds > self.config.max_tool_rounds {
                        warn!(rounds, "Max tool rounds reached");
                        return Err(AgentError::MaxToolRoundsReached(self.config.max_tool_rounds));
                    }

                    let calls: Vec<ToolCall> = calls.into_iter().map(with_call_id).collect();
                    let results = self.execute_round(&calls, dir, &mut records).await;
                    turn.push(ChatMessage::assistant_tool_calls(content, calls));
                    turn.extend(results);
                }
            }
        }
    }

    /// Run every call of one round in order, returning one result message per call
    async fn execute_round(
        &self,
        calls: &[ToolCall],
        dir: &WorkingDir,
        records: &mut Vec<ToolCallRecord>,
    ) -> Vec<ChatMessage> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let name = call.function.name.as_str();
            let started = Instant::now();

            let (key_argument, output) = match ToolInvocation::from_call(call) {
                Ok(invocation) => {
                    self.observer.on_tool_call(&invocation);
                    let tool_span = info_span!(
                        "tool_call",
                        tool = name,
                        call_id = %call.id,
                        otel.name = "tool_call"
                    );
                    let output = self
                        .toolset
                        .invoke(&invocation.args, dir)
                        .instrument(tool_span)
                        .await;
                    (invocation.args.key_argument().to_string(), output)
                }
                Err(e) => {
                    warn!(tool = name, error = %e, "Rejected tool call");
                    (String::new(), ToolOutput::rejected(&e))
                }
            };

            self.observer.on_tool_result(name, &output);
            records.push(ToolCallRecord {
                call_id: call.id.clone(),
                name: name.to_string(),
                key_argument,
                status: output.status,
                duration_ms: started.elapsed().as_secs_f64() * 1000.0,
            });
            results.push(ChatMessage::tool_result(&call.id, name, output.content));
        }

        results
    }

    /// Ask the model for a short folder name for `request`
    ///
    /// Never fails; see [`NamingAssistant`].
    pub async fn suggest_short_name(&self, request: &str) -> String {
        NamingAssistant::new(self.backend.clone(), self.observer.clone())
            .suggest_short_name(request)
            .await
    }

    /// Committed conversation history
    pub fn history(&self) -> &[ChatMessage] {
        self.state.messages()
    }

    pub fn message_count(&self) -> usize {
        self.state.len()
    }

    pub fn usage(&self) -> UsageCounters {
        self.state.usage()
    }

    /// `(tokens used so far, configured context window)`
    pub fn context_usage(&self) -> (u64, u64) {
        (self.state.usage().total(), self.config.context_window)
    }

    /// Forget the conversation; usage counters are kept
    pub fn clear_history(&mut self) {
        self.state.reset();
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }
}

/// Give calls without a backend id a local one so results can be matched
fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_empty() {
        call.id = Uuid::new_v4().simple().to_string()[..9].to_string();
    }
    call
}

/// Default system prompt for the app-building agent
pub const DEFAULT_AGENT_SYSTEM_PROMPT: &str = r#"You are an autonomous web developer.
Your goal is to build a functional, good-looking web application (HTML pages, not a JSON API) in the app directory you are working in.

Start every response with a short reasoning note wrapped in <thought> tags, e.g. <thought>The database schema comes first.</thought>

Tools (all paths are relative to the app directory):
- list_entries, read_text_file, search_text to explore
- make_directory, write_text_file to create and change files
- execute_shell to run commands inside the app directory

Workflow:
1. EXPLORE: list the directory first. If files exist you are MODIFYING an existing app; do not overwrite unless asked.
2. PLAN: decide the database schema and the pages needed.
3. BUILD:
   - Run `uv init --app --no-workspace` to create a standalone `pyproject.toml`.
   - Add dependencies with `uv add fastapi uvicorn sqlalchemy jinja2 python-multipart` (plus anything else needed).
   - `database.py`: SQLite engine, SessionLocal and Base.
   - `models.py`: SQLAlchemy models importing Base from database.py.
   - `templates/`: Jinja2 templates styled with Tailwind CSS.
   - `main.py` in the app directory root: FastAPI routes returning `Jinja2Templates.TemplateResponse`, calling `init_db()` on startup.
4. VERIFY: run `python -m py_compile main.py models.py database.py` and fix any errors.

Rules:
- Never use requirements.txt; manage dependencies with `uv add`.
- Routes must return HTML via templates. Use Jinja2 syntax only.
- Read POST form fields with `Form(...)` parameters, not SQLAlchemy models as request bodies.
- Do not create a nested project folder; `main.py` lives directly in the app directory.
- Build the simplest working version. No authentication unless asked.
- Ignore errors such as 'Address already in use' from servers; focus on correct, complete code.

When the work is done, reply with a short plain-text summary of what you built or changed."#;
