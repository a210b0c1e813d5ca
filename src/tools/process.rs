//! Time-bounded subprocess capabilities
//!
//! Each child runs in its own process group with stdin closed. When the
//! deadline passes the whole group is sent SIGKILL, so commands that fork
//! (`sh -c "sleep 60 &"`, dev servers) do not outlive the call.

use std::process::{Output, Stdio};
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ToolOutput, WorkingDir};

/// Outcome of a bounded run
enum Bounded {
    Finished(Output),
    TimedOut,
}

/// Spawn `cmd` and wait at most `limit` for it to exit
async fn run_bounded(mut cmd: Command, limit: Duration) -> std::io::Result<Bounded> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);

    let child = cmd.spawn()?;
    let pid = child.id();

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => result.map(Bounded::Finished),
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Ok(Bounded::TimedOut)
        }
    }
}

fn kill_process_group(pid: u32) {
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) => debug!(pid, "Killed timed-out process group"),
        // ESRCH: the group already exited
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "Failed to kill process group"),
    }
}

/// `search_text`: `grep -rnI` for `pattern` under `path`
pub async fn search_text(
    dir: &WorkingDir,
    pattern: &str,
    path: &str,
    limit: Duration,
) -> ToolOutput {
    if let Err(e) = dir.resolve(path) {
        return ToolOutput::rejected(&e);
    }
    let target = match dir.normalize(path) {
        Ok(p) if p.as_os_str().is_empty() => ".".into(),
        Ok(p) => p,
        Err(e) => return ToolOutput::rejected(&e),
    };

    if !dir.root().join(&target).exists() {
        return ToolOutput::failed(format!("Search failed: path does not exist: {}", path));
    }

    let mut cmd = Command::new("grep");
    cmd.args(["-r", "-n", "-I", "-e", pattern, "--"])
        .arg(&target)
        .current_dir(dir.root());

    match run_bounded(cmd, limit).await {
        Ok(Bounded::Finished(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stdout.is_empty() {
                ToolOutput::success(stdout.into_owned())
            } else if output.status.code() == Some(1) || stderr.trim().is_empty() {
                ToolOutput::success("No matches found.")
            } else {
                ToolOutput::failed(format!("Search failed: {}", stderr.trim()))
            }
        }
        Ok(Bounded::TimedOut) => {
            ToolOutput::timed_out(format!("Search timed out after {:?}.", limit))
        }
        Err(e) => ToolOutput::failed(format!("Search failed: {}", e)),
    }
}

/// `execute_shell`: run `command` through `sh -c` in the app directory
pub async fn execute_shell(dir: &WorkingDir, command: &str, limit: Duration) -> ToolOutput {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(dir.root());

    match run_bounded(cmd, limit).await {
        Ok(Bounded::Finished(output)) => {
            let mut text = format!(
                "STDOUT:\n{}\nSTDERR:\n{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            if output.status.success() {
                ToolOutput::success(text)
            } else {
                match output.status.code() {
                    Some(code) => text.push_str(&format!("\nEXIT CODE: {}", code)),
                    None => text.push_str("\nEXIT CODE: terminated by signal"),
                }
                ToolOutput::failed(text)
            }
        }
        Ok(Bounded::TimedOut) => ToolOutput::timed_out(format!(
            "Command execution timed out after {:?}.",
            limit
        )),
        Err(e) => ToolOutput::failed(format!("Command execution failed: {}", e)),
    }
}
