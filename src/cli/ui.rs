//! Terminal presentation: spinner, coloured status lines, usage bar

use std::io::Write;
use std::time::{Duration, Instant};

use colored::{ColoredString, Colorize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::agent::AgentObserver;
use crate::tools::{ToolArgs, ToolInvocation, ToolOutput, ToolStatus};

const SEPARATOR_WIDTH: usize = 60;
const BAR_WIDTH: usize = 30;

/// ASCII spinner animated on its own task until stopped
pub struct Spinner {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    const FRAMES: [char; 4] = ['\\', '|', '/', '-'];

    pub fn start(message: impl Into<String>) -> Self {
        let message = message.into();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            let mut frame = 0usize;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let glyph = Self::FRAMES[frame % Self::FRAMES.len()];
                        print!("\r{} {} ({}s)...", glyph, message, started.elapsed().as_secs());
                        let _ = std::io::stdout().flush();
                        frame += 1;
                    }
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Stop the animation and clear its line
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        clear_line();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn clear_line() {
    print!("\r\x1b[2K");
    let _ = std::io::stdout().flush();
}

pub fn print_header() {
    let header = r#"
╔═══════════════════════════════════════════════════════════╗
║                      QuickApp                             ║
║            AI-Powered Web App Generator                   ║
╚═══════════════════════════════════════════════════════════╝
"#;
    println!("{}", header.bright_cyan());
}

pub fn print_separator() {
    println!("{}", "─".repeat(SEPARATOR_WIDTH).bright_black());
}

pub fn print_success(message: impl AsRef<str>) {
    println!("{}", format!("✓ {}", message.as_ref()).green());
}

pub fn print_error(message: impl AsRef<str>) {
    println!("{}", format!("✗ {}", message.as_ref()).red());
}

pub fn print_info(message: impl AsRef<str>) {
    println!("{}", format!("ℹ {}", message.as_ref()).blue());
}

pub fn print_warning(message: impl AsRef<str>) {
    println!("{}", format!("⚠ {}", message.as_ref()).yellow());
}

/// Filled/empty bar and percentage for `current` of `max`
pub fn context_bar(current: u64, max: u64, width: usize) -> (String, f64) {
    let ratio = if max == 0 {
        1.0
    } else {
        (current as f64 / max as f64).min(1.0)
    };
    let filled = (ratio * width as f64) as usize;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(width - filled));
    let percentage = if max == 0 {
        100.0
    } else {
        current as f64 / max as f64 * 100.0
    };
    (bar, percentage)
}

pub fn print_context_usage(current: u64, max: u64) {
    let (bar, percentage) = context_bar(current, max, BAR_WIDTH);
    let line = format!(
        "Context: [{}] {}/{} tokens ({:.1}%)",
        bar, current, max, percentage
    );
    let coloured: ColoredString = if percentage < 50.0 {
        line.green()
    } else if percentage < 80.0 {
        line.yellow()
    } else {
        line.red()
    };
    println!("\n{}", coloured);
}

/// Observer that narrates tool calls on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct CliObserver;

impl CliObserver {
    fn describe(args: &ToolArgs) -> String {
        match args {
            ToolArgs::ListEntries { path } => format!("📂 Agent is listing files in: {}", path),
            ToolArgs::ReadTextFile { filename } => format!("📖 Agent is reading file: {}", filename),
            ToolArgs::MakeDirectory { path } => format!("📂 Agent is creating directory: {}", path),
            ToolArgs::WriteTextFile { filename, .. } => {
                format!("✍️  Agent is writing file: {}", filename)
            }
            ToolArgs::SearchText { pattern, path } => {
                format!("🔍 Agent is searching for '{}' in {}", pattern, path)
            }
            ToolArgs::ExecuteShell { command } => {
                format!("💻 Agent is executing command: {}", command)
            }
        }
    }
}

impl AgentObserver for CliObserver {
    fn on_tool_call(&self, invocation: &ToolInvocation) {
        clear_line();
        println!("{}", Self::describe(&invocation.args));
    }

    fn on_tool_result(&self, name: &str, output: &ToolOutput) {
        let first_line = output.content.lines().next().unwrap_or_default();
        match output.status {
            ToolStatus::Success => {}
            ToolStatus::Failed => {
                clear_line();
                println!("{}", format!("   {} failed: {}", name, first_line).bright_black());
            }
            ToolStatus::TimedOut => {
                clear_line();
                print_warning(format!("{} timed out", name));
            }
        }
    }

    fn on_status(&self, message: &str) {
        clear_line();
        println!("{}", message.bright_black());
    }
}
