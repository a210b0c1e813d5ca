//! Capabilities the model may invoke against an app directory
//!
//! The set is fixed: [`Capability`] is the declared table (name, schema,
//! timeout policy) and [`Toolset::invoke`] is the only dispatcher. Every
//! handler returns a [`ToolOutput`]; faults become text for the model and
//! never cross this boundary as Rust errors.
//!
//! # Trust boundary
//!
//! File capabilities are confined to the [`WorkingDir`] root: absolute paths
//! and `..` components that climb above it are refused, as are paths that
//! reach outside through a symlink already present in the directory. `execute_shell` runs
//! an arbitrary model-supplied command through `sh -c` with the root as its
//! current directory and is NOT sandboxed beyond that.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::llm::{Tool, ToolCall, ToolFunction};

pub mod fs;
pub mod process;

/// Default hard timeout for `search_text`
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default hard timeout for `execute_shell`
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on text handed back to the model per call
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// The declared capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ListEntries,
    ReadTextFile,
    MakeDirectory,
    WriteTextFile,
    SearchText,
    ExecuteShell,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ListEntries,
        Capability::ReadTextFile,
        Capability::MakeDirectory,
        Capability::WriteTextFile,
        Capability::SearchText,
        Capability::ExecuteShell,
    ];

    /// Name the model uses to request this capability
    pub fn name(self) -> &'static str {
        match self {
            Capability::ListEntries => "list_entries",
            Capability::ReadTextFile => "read_text_file",
            Capability::MakeDirectory => "make_directory",
            Capability::WriteTextFile => "write_text_file",
            Capability::SearchText => "search_text",
            Capability::ExecuteShell => "execute_shell",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Capability::ListEntries => "List files and directories in a path relative to the app directory. Directories end with '/'.",
            Capability::ReadTextFile => "Read the content of a text file relative to the app directory.",
            Capability::MakeDirectory => "Create a directory (and any parent directories). Succeeds if it already exists.",
            Capability::WriteTextFile => "Write content to a file, replacing it. Missing parent directories are created.",
            Capability::SearchText => "Search for a pattern (grep regular expression) in files under a path.",
            Capability::ExecuteShell => "Execute a shell command in the app directory and return its stdout and stderr.",
        }
    }

    fn parameters(self) -> serde_json::Value {
        match self {
            Capability::ListEntries => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Relative directory path", "default": "."}
                }
            }),
            Capability::ReadTextFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "filename": {"type": "string", "description": "Relative file path"}
                },
                "required": ["filename"]
            }),
            Capability::MakeDirectory => serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Relative directory path"}
                },
                "required": ["path"]
            }),
            Capability::WriteTextFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "filename": {"type": "string", "description": "Relative file path"},
                    "content": {"type": "string", "description": "Full file content"}
                },
                "required": ["filename", "content"]
            }),
            Capability::SearchText => serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string", "description": "Pattern to search for"},
                    "path": {"type": "string", "description": "Relative path to search in", "default": "."}
                },
                "required": ["pattern"]
            }),
            Capability::ExecuteShell => serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Shell command to run"}
                },
                "required": ["command"]
            }),
        }
    }

    /// Wall-clock bound for capabilities that shell out
    pub fn timeout(self, limits: &ToolLimits) -> Option<Duration> {
        match self {
            Capability::SearchText => Some(limits.search_timeout),
            Capability::ExecuteShell => Some(limits.shell_timeout),
            _ => None,
        }
    }

    /// Schema entry declared to the model
    pub fn definition(self) -> Tool {
        Tool {
            tool_type: "function".to_string(),
            function: ToolFunction {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters(),
            },
        }
    }
}

fn current_dir() -> String {
    ".".to_string()
}

/// Validated arguments for one capability
///
/// Deserialized from `{"name": ..., "arguments": {...}}` so serde enforces each
/// capability's parameter contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolArgs {
    ListEntries {
        #[serde(default = "current_dir")]
        path: String,
    },
    ReadTextFile {
        filename: String,
    },
    MakeDirectory {
        path: String,
    },
    WriteTextFile {
        filename: String,
        content: String,
    },
    SearchText {
        pattern: String,
        #[serde(default = "current_dir")]
        path: String,
    },
    ExecuteShell {
        command: String,
    },
}

impl ToolArgs {
    pub fn capability(&self) -> Capability {
        match self {
            ToolArgs::ListEntries { .. } => Capability::ListEntries,
            ToolArgs::ReadTextFile { .. } => Capability::ReadTextFile,
            ToolArgs::MakeDirectory { .. } => Capability::MakeDirectory,
            ToolArgs::WriteTextFile { .. } => Capability::WriteTextFile,
            ToolArgs::SearchText { .. } => Capability::SearchText,
            ToolArgs::ExecuteShell { .. } => Capability::ExecuteShell,
        }
    }

    /// The argument worth logging for this call
    pub fn key_argument(&self) -> &str {
        match self {
            ToolArgs::ListEntries { path } | ToolArgs::MakeDirectory { path } => path,
            ToolArgs::ReadTextFile { filename } | ToolArgs::WriteTextFile { filename, .. } => {
                filename
            }
            ToolArgs::SearchText { pattern, .. } => pattern,
            ToolArgs::ExecuteShell { command } => command,
        }
    }
}

/// Why a tool call could not be executed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownCapability(String),
    #[error("arguments for '{name}' are not valid JSON: {reason}")]
    MalformedArguments { name: String, reason: String },
    #[error("invalid arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },
    #[error("absolute paths are not allowed: '{0}'")]
    AbsolutePath(String),
    #[error("path '{0}' escapes the app directory")]
    PathEscape(String),
    #[error("path '{0}' leads outside the app directory through a symlink")]
    SymlinkEscape(String),
}

/// One validated request from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Backend-assigned id the result is keyed by
    pub id: String,
    pub args: ToolArgs,
}

impl ToolInvocation {
    /// Validate a raw tool call against the declared table
    pub fn from_call(call: &ToolCall) -> Result<Self, ToolError> {
        let name = call.function.name.as_str();
        if Capability::from_name(name).is_none() {
            return Err(ToolError::UnknownCapability(name.to_string()));
        }

        let raw = call.function.arguments.trim();
        let arguments: serde_json::Value = if raw.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(raw).map_err(|e| ToolError::MalformedArguments {
                name: name.to_string(),
                reason: e.to_string(),
            })?
        };

        let args = serde_json::from_value(serde_json::json!({
            "name": name,
            "arguments": arguments,
        }))
        .map_err(|e| ToolError::InvalidArguments {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            id: call.id.clone(),
            args,
        })
    }

    pub fn capability(&self) -> Capability {
        self.args.capability()
    }
}

/// The directory every capability of one task is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDir {
    root: PathBuf,
}

impl WorkingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize a model-supplied path to a relative path inside the root
    ///
    /// An empty result means the root itself.
    pub fn normalize(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let mut normalized = PathBuf::new();
        for component in Path::new(relative).components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(ToolError::AbsolutePath(relative.to_string()));
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(ToolError::PathEscape(relative.to_string()));
                    }
                }
                Component::Normal(part) => normalized.push(part),
            }
        }
        Ok(normalized)
    }

    /// Resolve a model-supplied path against the root
    ///
    /// Symlinks already on disk are followed: the deepest existing prefix
    /// must still canonicalize inside the root, and a dangling link is refused.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let full = self.root.join(self.normalize(relative)?);
        self.check_links(&full, relative)?;
        Ok(full)
    }

    fn check_links(&self, full: &Path, relative: &str) -> Result<(), ToolError> {
        // A missing root is reported by the capability itself
        let Ok(root) = self.root.canonicalize() else {
            return Ok(());
        };

        for prefix in full.ancestors() {
            if let Ok(real) = prefix.canonicalize() {
                if real.starts_with(&root) {
                    return Ok(());
                }
                return Err(ToolError::SymlinkEscape(relative.to_string()));
            }
            if prefix.symlink_metadata().is_ok() {
                return Err(ToolError::SymlinkEscape(relative.to_string()));
            }
        }
        Ok(())
    }
}

/// How a capability call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Failed,
    TimedOut,
}

/// Text result of a capability call plus its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// What the model sees
    pub content: String,
    pub status: ToolStatus,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: ToolStatus::Success,
        }
    }

    pub fn failed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: ToolStatus::Failed,
        }
    }

    pub fn timed_out(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: ToolStatus::TimedOut,
        }
    }

    /// Result for a call that failed validation
    pub fn rejected(error: &ToolError) -> Self {
        Self::failed(format!("Error: {}", error))
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// Cap the content at `max_bytes`, cutting on a char boundary
    fn truncated(mut self, max_bytes: usize) -> Self {
        if self.content.len() > max_bytes {
            let mut cut = max_bytes;
            while !self.content.is_char_boundary(cut) {
                cut -= 1;
            }
            let omitted = self.content.len() - cut;
            self.content.truncate(cut);
            self.content
                .push_str(&format!("\n... [output truncated, {} bytes omitted]", omitted));
        }
        self
    }
}

/// Resource bounds applied to capability calls
#[derive(Debug, Clone)]
pub struct ToolLimits {
    pub search_timeout: Duration,
    pub shell_timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for ToolLimits {
    fn default() -> Self {
        Self {
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            shell_timeout: DEFAULT_SHELL_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// The capability table bound to a set of limits
#[derive(Debug, Clone)]
pub struct Toolset {
    limits: ToolLimits,
    definitions: Vec<Tool>,
}

impl Default for Toolset {
    fn default() -> Self {
        Self::new(ToolLimits::default())
    }
}

impl Toolset {
    pub fn new(limits: ToolLimits) -> Self {
        let definitions = Capability::ALL.iter().map(|c| c.definition()).collect();
        Self {
            limits,
            definitions,
        }
    }

    /// Schema declared to the model on every request
    pub fn definitions(&self) -> &[Tool] {
        &self.definitions
    }

    /// Run one validated invocation inside `dir`
    pub async fn invoke(&self, args: &ToolArgs, dir: &WorkingDir) -> ToolOutput {
        let timeout = args.capability().timeout(&self.limits);
        let output = match args {
            ToolArgs::ListEntries { path } => fs::list_entries(dir, path).await,
            ToolArgs::ReadTextFile { filename } => fs::read_text_file(dir, filename).await,
            ToolArgs::MakeDirectory { path } => fs::make_directory(dir, path).await,
            ToolArgs::WriteTextFile { filename, content } => {
                fs::write_text_file(dir, filename, content).await
            }
            ToolArgs::SearchText { pattern, path } => {
                process::search_text(dir, pattern, path, timeout.unwrap_or(DEFAULT_SEARCH_TIMEOUT))
                    .await
            }
            ToolArgs::ExecuteShell { command } => {
                process::execute_shell(dir, command, timeout.unwrap_or(DEFAULT_SHELL_TIMEOUT)).await
            }
        };
        output.truncated(self.limits.max_output_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_0".to_string(),
            call_type: "function".to_string(),
            function: crate::llm::FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn test_definitions_cover_all_capabilities() {
        let toolset = Toolset::default();
        let names: Vec<&str> = toolset
            .definitions()
            .iter()
            .map(|t| t.function.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "list_entries",
                "read_text_file",
                "make_directory",
                "write_text_file",
                "search_text",
                "execute_shell"
            ]
        );
        for tool in toolset.definitions() {
            assert_eq!(tool.tool_type, "function");
            assert_eq!(tool.function.parameters["type"], "object");
        }
    }

    #[test]
    fn test_timeout_policy() {
        let limits = ToolLimits::default();
        assert_eq!(Capability::SearchText.timeout(&limits), Some(Duration::from_secs(10)));
        assert_eq!(Capability::ExecuteShell.timeout(&limits), Some(Duration::from_secs(30)));
        assert_eq!(Capability::ReadTextFile.timeout(&limits), None);
    }

    #[test]
    fn test_invocation_defaults_path() {
        let invocation = ToolInvocation::from_call(&call("list_entries", "{}")).unwrap();
        assert_eq!(
            invocation.args,
            ToolArgs::ListEntries {
                path: ".".to_string()
            }
        );

        let invocation = ToolInvocation::from_call(&call("search_text", "")).unwrap_err();
        assert!(matches!(invocation, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_invocation_rejects_unknown_and_malformed() {
        assert_eq!(
            ToolInvocation::from_call(&call("delete_everything", "{}")),
            Err(ToolError::UnknownCapability("delete_everything".to_string()))
        );
        assert!(matches!(
            ToolInvocation::from_call(&call("read_text_file", "{not json")),
            Err(ToolError::MalformedArguments { .. })
        ));
        assert!(matches!(
            ToolInvocation::from_call(&call("write_text_file", r#"{"filename": "a.txt"}"#)),
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_key_argument() {
        let invocation =
            ToolInvocation::from_call(&call("execute_shell", r#"{"command": "ls -la"}"#)).unwrap();
        assert_eq!(invocation.args.key_argument(), "ls -la");
        assert_eq!(invocation.capability(), Capability::ExecuteShell);
    }

    #[test]
    fn test_working_dir_confines_paths() {
        let dir = WorkingDir::new("/srv/apps/todo");

        assert_eq!(dir.resolve(".").unwrap(), PathBuf::from("/srv/apps/todo"));
        assert_eq!(
            dir.resolve("templates/../static/./app.css").unwrap(),
            PathBuf::from("/srv/apps/todo/static/app.css")
        );
        assert_eq!(
            dir.resolve("../other"),
            Err(ToolError::PathEscape("../other".to_string()))
        );
        assert_eq!(
            dir.resolve("/etc/passwd"),
            Err(ToolError::AbsolutePath("/etc/passwd".to_string()))
        );
    }

    #[test]
    fn test_output_truncation() {
        let output = ToolOutput::success("é".repeat(10)).truncated(5);
        assert!(output.content.starts_with("éé"));
        assert!(output.content.contains("output truncated"));

        let short = ToolOutput::success("ok").truncated(5);
        assert_eq!(short.content, "ok");
    }

    #[tokio::test]
    async fn test_rejected_calls_become_text() {
        let toolset = Toolset::default();
        let dir = WorkingDir::new(std::env::temp_dir());

        let error = ToolInvocation::from_call(&call("rm_rf", "{}")).unwrap_err();
        let output = ToolOutput::rejected(&error);
        assert_eq!(output.status, ToolStatus::Failed);
        assert_eq!(output.content, "Error: unknown tool 'rm_rf'");

        let invocation =
            ToolInvocation::from_call(&call("read_text_file", r#"{"filename": "../../etc/passwd"}"#))
                .unwrap();
        let output = toolset.invoke(&invocation.args, &dir).await;
        assert_eq!(output.status, ToolStatus::Failed);
        assert!(output.content.contains("escapes the app directory"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_refused() {
        let outside = tempfile::TempDir::new().unwrap();
        let app = tempfile::TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), app.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("missing.txt"),
            app.path().join("dangling"),
        )
        .unwrap();
        std::fs::create_dir(app.path().join("static")).unwrap();
        std::os::unix::fs::symlink(app.path().join("static"), app.path().join("assets")).unwrap();
        let dir = WorkingDir::new(app.path());

        assert_eq!(
            dir.resolve("link/x.txt"),
            Err(ToolError::SymlinkEscape("link/x.txt".to_string()))
        );
        assert_eq!(
            dir.resolve("dangling"),
            Err(ToolError::SymlinkEscape("dangling".to_string()))
        );
        assert_eq!(
            dir.resolve("assets/app.css").unwrap(),
            app.path().join("assets/app.css")
        );
        assert_eq!(dir.resolve("new/dir").unwrap(), app.path().join("new/dir"));
    }
}
