//! Interactive shell around an [`AgentSession`]
//!
//! ```text
//! readline → Command::parse → route
//!                               ├─ built-in (clear/new/open/status/help)
//!                               └─ Prompt → name app dir → run_task under spinner
//! ```

pub mod ui;

use std::future::Future;
use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use crate::agent::{AgentSession, TaskOutcome};
use ui::{
    print_context_usage, print_error, print_info, print_separator, print_success, print_warning,
    Spinner,
};

/// One line of user input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Clear,
    New,
    Help,
    Status,
    /// `open <name>`; None when the name is missing
    Open(Option<String>),
    Prompt(String),
    Empty,
}

impl Command {
    /// Built-in commands are matched case-insensitively; anything else is a prompt
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }

        let lowered = trimmed.to_lowercase();
        match lowered.as_str() {
            "exit" | "quit" | "q" => return Command::Exit,
            "clear" => return Command::Clear,
            "new" => return Command::New,
            "help" => return Command::Help,
            "status" => return Command::Status,
            "open" => return Command::Open(None),
            _ => {}
        }

        // `open` takes exactly one argument, so "open source tracker" stays a prompt
        if let Some((head, rest)) = trimmed.split_once(char::is_whitespace) {
            let name = rest.trim();
            if head.eq_ignore_ascii_case("open") && !name.contains(char::is_whitespace) {
                return Command::Open(Some(name.to_string()));
            }
        }

        Command::Prompt(trimmed.to_string())
    }
}

/// Find an existing app directory by name under `apps_dir`, or as a path
pub fn resolve_app(apps_dir: &Path, name: &str) -> Option<PathBuf> {
    let under_apps = apps_dir.join(name);
    if under_apps.is_dir() {
        return Some(under_apps);
    }
    let direct = PathBuf::from(name);
    direct.is_dir().then_some(direct)
}

pub struct Repl {
    session: AgentSession,
    apps_dir: PathBuf,
    current_app: Option<PathBuf>,
}

impl Repl {
    pub fn new(session: AgentSession, apps_dir: impl Into<PathBuf>, current_app: Option<PathBuf>) -> Self {
        Self {
            session,
            apps_dir: apps_dir.into(),
            current_app,
        }
    }

    /// Read and dispatch lines until `exit` or end of input
    pub async fn run(&mut self) -> Result<(), ReadlineError> {
        let mut editor = DefaultEditor::new()?;

        print_info("Type 'help' for commands, 'exit' to quit.");
        if let Some(app) = &self.current_app {
            print_info(format!("Working on existing app: {}", app.display()));
        }
        println!();

        loop {
            let line = tokio::task::block_in_place(|| editor.readline("> "));
            match line {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    if !self.handle(Command::parse(&line)).await {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    print_info("Use 'exit' or Ctrl-D to quit.");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e),
            }
        }

        print_info("Goodbye!");
        Ok(())
    }

    /// Execute one command; false means the loop should stop
    pub async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Exit => return false,
            Command::Empty => {}
            Command::Help => print_help(),
            Command::Clear => {
                self.session.clear_history();
                print_success("Conversation history cleared");
            }
            Command::New => {
                self.session.clear_history();
                self.current_app = None;
                print_success("Starting a new app; the next prompt creates its directory");
            }
            Command::Status => self.print_status(),
            Command::Open(None) => print_error("Usage: open <name>"),
            Command::Open(Some(name)) => match resolve_app(&self.apps_dir, &name) {
                Some(dir) => {
                    print_success(format!("Working on app: {}", dir.display()));
                    self.current_app = Some(dir);
                }
                None => print_error(format!("App not found: {}", name)),
            },
            Command::Prompt(prompt) => self.process_prompt(&prompt).await,
        }
        true
    }

    fn print_status(&self) {
        let usage = self.session.usage();
        print_separator();
        println!("Model:    {}", self.session.model());
        println!(
            "App:      {}",
            self.current_app
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none yet)".to_string())
        );
        println!("Messages: {}", self.session.message_count());
        println!(
            "Tokens:   {} in / {} out",
            usage.input_tokens, usage.output_tokens
        );
        let (current, max) = self.session.context_usage();
        print_context_usage(current, max);
        print_separator();
    }

    async fn ensure_app_dir(&mut self, prompt: &str) -> std::io::Result<PathBuf> {
        if let Some(dir) = &self.current_app {
            return Ok(dir.clone());
        }

        let name = await_with_spinner(
            "Agent is suggesting an app name",
            self.session.suggest_short_name(prompt),
            tokio::signal::ctrl_c,
        )
        .await;
        let dir = self.apps_dir.join(&name);
        tokio::fs::create_dir_all(&dir).await?;
        info!(app_dir = %dir.display(), "Created app directory");
        print_info(format!("Created app directory: {}", dir.display()));
        self.current_app = Some(dir.clone());
        Ok(dir)
    }

    async fn process_prompt(&mut self, prompt: &str) {
        let app_dir = match self.ensure_app_dir(prompt).await {
            Ok(dir) => dir,
            Err(e) => {
                print_error(format!("Could not create app directory: {}", e));
                return;
            }
        };

        let result = await_with_spinner(
            "Agent is building your app autonomously",
            self.session.run_task(prompt, &app_dir),
            tokio::signal::ctrl_c,
        )
        .await;

        match result {
            Ok(outcome) => self.print_outcome(&outcome, &app_dir),
            Err(e) => {
                warn!(error = %e, "Task failed");
                print_error(format!("Agent building failed: {}", e));
                print_info("History is unchanged; you can retry the request.");
            }
        }
    }

    fn print_outcome(&self, outcome: &TaskOutcome, app_dir: &Path) {
        print_success(format!(
            "Agent finished the task ({} tool rounds, {} tool calls)",
            outcome.tool_rounds,
            outcome.tool_calls.len()
        ));
        print_info("Agent Message:");
        println!("\n{}\n", outcome.final_response.trim());
        print_separator();
        print_success(format!("App built at: {}", app_dir.display()));
        println!("To run your app:");
        println!("  cd {}", app_dir.display());
        println!("  uv run uvicorn main:app --reload");
        println!("Then open http://localhost:8000 in your browser.");
        print_separator();
        let (current, max) = self.session.context_usage();
        print_context_usage(current, max);
    }
}

/// Drive `work` to completion under a spinner
///
/// `interrupt` firing stops only the spinner; `work` is still awaited.
async fn await_with_spinner<F, I, S>(message: &str, work: F, mut interrupt: I) -> F::Output
where
    F: Future,
    I: FnMut() -> S,
    S: Future,
{
    let mut spinner = Some(Spinner::start(message));
    tokio::pin!(work);

    let output = loop {
        tokio::select! {
            output = &mut work => break output,
            _ = interrupt(), if spinner.is_some() => {
                if let Some(s) = spinner.take() {
                    s.stop().await;
                }
                print_warning("Interrupted; waiting for the current step to finish...");
            }
        }
    };

    if let Some(s) = spinner {
        s.stop().await;
    }
    output
}

fn print_help() {
    print_separator();
    println!("Commands:");
    println!("  <request>     Describe the app to build, or a change to the current app");
    println!("  open <name>   Continue an existing app (under the apps directory or a path)");
    println!("  new           Start a fresh app and clear the history");
    println!("  clear         Clear the conversation history, keep the current app");
    println!("  status        Show model, app, message count and token usage");
    println!("  help          Show this help");
    println!("  exit          Quit (also: quit, q, Ctrl-D)");
    print_separator();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_builtins() {
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("  QUIT "), Command::Exit);
        assert_eq!(Command::parse("q"), Command::Exit);
        assert_eq!(Command::parse("Clear"), Command::Clear);
        assert_eq!(Command::parse("new"), Command::New);
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("status"), Command::Status);
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn test_parse_open() {
        assert_eq!(Command::parse("open"), Command::Open(None));
        assert_eq!(
            Command::parse("OPEN Todo_3fa"),
            Command::Open(Some("Todo_3fa".to_string()))
        );
        assert_eq!(
            Command::parse("open source issue tracker"),
            Command::Prompt("open source issue tracker".to_string())
        );
    }

    #[test]
    fn test_parse_prompt_keeps_text() {
        assert_eq!(
            Command::parse("  Build a Todo app  "),
            Command::Prompt("Build a Todo app".to_string())
        );
        assert_eq!(
            Command::parse("clear the completed items"),
            Command::Prompt("clear the completed items".to_string())
        );
    }

    #[tokio::test]
    async fn test_interrupt_stops_spinner_but_awaits_work() {
        let start = std::time::Instant::now();
        let output = await_with_spinner(
            "working",
            async {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                42
            },
            || async {},
        )
        .await;

        assert_eq!(output, 42);
        assert!(start.elapsed() >= std::time::Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_work_finishes_without_interrupt() {
        let output =
            await_with_spinner("working", async { "named" }, std::future::pending::<()>).await;
        assert_eq!(output, "named");
    }

    #[test]
    fn test_resolve_app() {
        let apps = TempDir::new().unwrap();
        std::fs::create_dir(apps.path().join("todo_abc")).unwrap();

        assert_eq!(
            resolve_app(apps.path(), "todo_abc"),
            Some(apps.path().join("todo_abc"))
        );
        assert_eq!(resolve_app(apps.path(), "missing_123"), None);

        let elsewhere = TempDir::new().unwrap();
        let direct = elsewhere.path().to_string_lossy().to_string();
        assert_eq!(
            resolve_app(apps.path(), &direct),
            Some(elsewhere.path().to_path_buf())
        );
    }
}
