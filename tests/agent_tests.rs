//! Integration tests for the agent system
//!
//! These tests drive `AgentSession` end to end against a scripted in-memory
//! backend, so the task loop, capability execution and history accounting
//! are exercised without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use quickapp::agent::{AgentConfig, AgentError, AgentSession};
use quickapp::llm::{
    ChatBackend, ChatError, ChatMessage, ModelResponse, Role, Tool, ToolCall, Usage,
};
use quickapp::tools::ToolStatus;

/// Backend that replays canned responses and records every request
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ModelResponse, ChatError>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<ModelResponse, ChatError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, reply: Result<ModelResponse, ChatError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[Tool],
    ) -> Result<ModelResponse, ChatError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::Unavailable("script exhausted".to_string())))
    }
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall::new(id, name, args)
}

fn session(backend: &Arc<ScriptedBackend>) -> AgentSession {
    AgentSession::new(backend.clone(), AgentConfig::default())
}

#[tokio::test]
async fn test_multi_round_task_builds_files() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::tool_calls(
            vec![call("c1", "make_directory", json!({"path": "templates"}))],
            Usage::new(100, 10),
        )),
        Ok(ModelResponse::tool_calls(
            vec![call(
                "c2",
                "write_text_file",
                json!({"filename": "main.py", "content": "print('hi')\n"}),
            )],
            Usage::new(150, 20),
        )),
        Ok(ModelResponse::text("Done. Run it with uv.", Usage::new(200, 30))),
    ]);
    let mut session = session(&backend);

    let outcome = session
        .run_task("Build a hello app", app.path())
        .await
        .unwrap();

    assert_eq!(outcome.final_response, "Done. Run it with uv.");
    assert_eq!(outcome.tool_rounds, 2);
    assert_eq!(outcome.tool_calls.len(), 2);
    assert!(outcome
        .tool_calls
        .iter()
        .all(|r| r.status == ToolStatus::Success));
    assert!(app.path().join("templates").is_dir());
    assert_eq!(
        std::fs::read_to_string(app.path().join("main.py")).unwrap(),
        "print('hi')\n"
    );

    // user + (assistant calls + result) * 2 + final assistant
    assert_eq!(session.message_count(), 6);
    assert_eq!(outcome.usage, Usage::new(450, 60));
    assert_eq!(session.usage().input_tokens, 450);
    assert_eq!(session.usage().output_tokens, 60);
    assert_eq!(session.context_usage().0, 510);
}

#[tokio::test]
async fn test_request_carries_system_prompt_and_results() {
    let app = TempDir::new().unwrap();
    std::fs::write(app.path().join("notes.txt"), "remember the milk").unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::tool_calls(
            vec![call("r1", "read_text_file", json!({"filename": "notes.txt"}))],
            Usage::default(),
        )),
        Ok(ModelResponse::text("It says milk", Usage::default())),
    ]);
    let mut session = session(&backend);
    session.run_task("What do my notes say?", app.path()).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0][0].role, Role::System);
    assert_eq!(requests[0][1].content, "What do my notes say?");

    let tool_msg = requests[1].last().unwrap();
    assert_eq!(tool_msg.role, Role::Tool);
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("r1"));
    assert_eq!(tool_msg.content, "remember the milk");
}

#[tokio::test]
async fn test_results_matched_by_call_id() {
    let app = TempDir::new().unwrap();
    std::fs::write(app.path().join("a.txt"), "alpha").unwrap();
    std::fs::write(app.path().join("b.txt"), "beta").unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::tool_calls(
            vec![
                call("id_b", "read_text_file", json!({"filename": "b.txt"})),
                call("id_a", "read_text_file", json!({"filename": "a.txt"})),
            ],
            Usage::default(),
        )),
        Ok(ModelResponse::text("read both", Usage::default())),
    ]);
    let mut session = session(&backend);
    session.run_task("read files", app.path()).await.unwrap();

    let results: Vec<(String, String)> = session
        .history()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.clone().unwrap(), m.content.clone()))
        .collect();
    assert_eq!(
        results,
        vec![
            ("id_b".to_string(), "beta".to_string()),
            ("id_a".to_string(), "alpha".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_tool_faults_become_text_results() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::tool_calls(
            vec![
                call("x1", "delete_everything", json!({})),
                call("x2", "read_text_file", json!({"filename": "missing.txt"})),
                call("x3", "write_text_file", json!({"filename": "../escape.txt", "content": "x"})),
                call("x4", "write_text_file", json!({"filename": "only_name.txt"})),
            ],
            Usage::default(),
        )),
        Ok(ModelResponse::text("handled", Usage::default())),
    ]);
    let mut session = session(&backend);
    let outcome = session.run_task("break things", app.path()).await.unwrap();

    assert_eq!(outcome.final_response, "handled");
    assert_eq!(outcome.tool_calls.len(), 4);
    assert!(outcome
        .tool_calls
        .iter()
        .all(|r| r.status == ToolStatus::Failed));
    assert!(!app.path().parent().unwrap().join("escape.txt").exists());

    let contents: Vec<&str> = session
        .history()
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.content.as_str())
        .collect();
    assert!(contents[0].starts_with("Error:"));
    assert!(contents[1].starts_with("Error reading missing.txt"));
    assert!(contents[2].starts_with("Error:"));
    assert!(contents[3].starts_with("Error:"));
}

#[tokio::test]
async fn test_backend_failure_leaves_history_unchanged() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text(
        "first answer",
        Usage::new(10, 5),
    ))]);
    let mut session = session(&backend);
    session.run_task("first", app.path()).await.unwrap();
    assert_eq!(session.message_count(), 2);

    backend.push(Ok(ModelResponse::tool_calls(
        vec![call("m1", "make_directory", json!({"path": "static"}))],
        Usage::new(20, 5),
    )));
    backend.push(Err(ChatError::Api {
        status: 500,
        body: "upstream exploded".to_string(),
    }));

    let err = session.run_task("second", app.path()).await.unwrap_err();
    assert!(matches!(err, AgentError::Backend(ChatError::Api { status: 500, .. })));
    assert_eq!(session.message_count(), 2);
    assert_eq!(session.usage().total(), 15);
    assert_eq!(session.history()[1].content, "first answer");
}

#[tokio::test]
async fn test_max_tool_rounds_abandons_turn() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(Vec::new());
    for i in 0..3 {
        backend.push(Ok(ModelResponse::tool_calls(
            vec![call(&format!("l{i}"), "list_entries", json!({}))],
            Usage::new(1, 1),
        )));
    }
    let config = AgentConfig {
        max_tool_rounds: 2,
        ..AgentConfig::default()
    };
    let mut session = AgentSession::new(backend.clone(), config);

    let err = session.run_task("loop forever", app.path()).await.unwrap_err();
    assert!(matches!(err, AgentError::MaxToolRoundsReached(2)));
    assert_eq!(session.message_count(), 0);
    assert_eq!(session.usage().total(), 0);
}

#[tokio::test]
async fn test_history_replayed_on_next_task() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::text("Built a todo app", Usage::new(10, 10))),
        Ok(ModelResponse::text("Added dark mode", Usage::new(20, 10))),
    ]);
    let mut session = session(&backend);
    session.run_task("Build a todo app", app.path()).await.unwrap();
    session.run_task("Add dark mode", app.path()).await.unwrap();

    let second = &backend.requests()[1];
    let contents: Vec<&str> = second.iter().skip(1).map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["Build a todo app", "Built a todo app", "Add dark mode"]
    );
    assert_eq!(session.message_count(), 4);
}

#[tokio::test]
async fn test_clear_history_keeps_usage() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::text("one", Usage::new(30, 3))),
        Ok(ModelResponse::text("two", Usage::new(40, 4))),
    ]);
    let mut session = session(&backend);
    session.run_task("first", app.path()).await.unwrap();
    session.clear_history();
    assert_eq!(session.message_count(), 0);
    assert_eq!(session.usage().total(), 33);

    session.run_task("second", app.path()).await.unwrap();
    let second = &backend.requests()[1];
    assert_eq!(second.len(), 2);
    assert_eq!(session.usage().total(), 77);
}

#[tokio::test]
async fn test_invalid_working_directory() {
    let app = TempDir::new().unwrap();
    let missing = app.path().join("does_not_exist");
    let backend = ScriptedBackend::new(Vec::new());
    let mut session = session(&backend);

    let err = session.run_task("anything", &missing).await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidWorkingDirectory(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_shell_runs_inside_app_directory() {
    let app = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(vec![
        Ok(ModelResponse::tool_calls(
            vec![call("s1", "execute_shell", json!({"command": "echo hi > marker.txt && pwd"}))],
            Usage::default(),
        )),
        Ok(ModelResponse::text("ok", Usage::default())),
    ]);
    let mut session = session(&backend);
    session.run_task("touch a marker", app.path()).await.unwrap();

    assert!(app.path().join("marker.txt").exists());
    let result = session
        .history()
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(result.content.starts_with("STDOUT:\n"));
}

#[tokio::test]
async fn test_session_naming() {
    let backend = ScriptedBackend::new(vec![Ok(ModelResponse::text(
        "<thought>short</thought> Inventory",
        Usage::new(5, 1),
    ))]);
    let session = session(&backend);

    let name = session.suggest_short_name("track my inventory").await;
    let (stem, suffix) = name.split_once('_').unwrap();
    assert_eq!(stem, "inventory");
    assert_eq!(suffix.len(), 3);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(session.message_count(), 0);
}
