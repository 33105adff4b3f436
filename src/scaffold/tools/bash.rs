//! Shell command execution in the working directory.
//!
//! [`run_command`] never fails: spawn errors and timeouts are reported as
//! text with the sentinel exit status `-1`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::{ExecutionContext, Tool, ToolError, ToolOutcome};

/// Exit status reported when the process could not run to completion.
pub const FAILED_EXIT_CODE: i32 = -1;

/// Start of the line appended to the output of a command that was killed
/// for running too long.
pub const TIMEOUT_NOTICE: &str = "Command timed out after";

/// How long to wait for output pipes to drain once the shell is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Combined output and exit status of a shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output followed by standard error.
    pub output: String,
    /// Process exit status, or `-1` if it did not exit normally.
    pub exit_code: i32,
}

impl CommandOutput {
    fn failed(output: String) -> Self {
        Self {
            output,
            exit_code: FAILED_EXIT_CODE,
        }
    }
}

/// Background reader for one output pipe.
///
/// Bytes land in a shared buffer as they arrive, so whatever was read is
/// still available when the pipe never closes.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let handle = tokio::spawn(async move {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                }
            }
        });
        Self { buf, handle }
    }

    /// Wait for end of file until `deadline`. Returns the text read so far
    /// and whether the pipe closed.
    async fn finish(mut self, deadline: Instant) -> (String, bool) {
        let closed = timeout_at(deadline, &mut self.handle).await.is_ok();
        if !closed {
            self.handle.abort();
        }
        let bytes = self.buf.lock().map(|buf| buf.clone()).unwrap_or_default();
        (String::from_utf8_lossy(&bytes).into_owned(), closed)
    }
}

/// Wait for both pipes, for at most `DRAIN_GRACE`. Returns stdout followed
/// by stderr and whether both pipes closed.
async fn drain(stdout: PipeReader, stderr: PipeReader) -> (String, bool) {
    let deadline = Instant::now() + DRAIN_GRACE;
    let ((mut output, out_closed), (errors, err_closed)) =
        tokio::join!(stdout.finish(deadline), stderr.finish(deadline));
    output.push_str(&errors);
    (output, out_closed && err_closed)
}

/// SIGKILL every process left in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group
    // created for this command by `process_group(0)`.
    let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid = pid, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Run `command` with `sh -c` in `working_dir`.
///
/// Output is stdout followed by stderr. The command runs in its own process
/// group. A command still running after `timeout_secs` is killed together
/// with everything it started; its captured output is kept and a notice is
/// appended. Background processes that keep the output pipes open after the
/// shell exits are killed once the drain grace period runs out.
pub async fn run_command(command: &str, working_dir: &Path, timeout_secs: u64) -> CommandOutput {
    debug!(command = %command, cwd = %working_dir.display(), "Running command");

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to start command");
            return CommandOutput::failed(format!("Failed to start command: {}", e));
        }
    };

    // The id is gone once the child is reaped, so keep it for the group kill.
    let pid = child.id();
    let stdout = PipeReader::spawn(child.stdout.take());
    let stderr = PipeReader::spawn(child.stderr.take());
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    match timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) => {
            let (output, closed) = drain(stdout, stderr).await;
            if !closed {
                warn!(
                    command = %command,
                    "Background process kept the output open, killing its process group"
                );
                kill_process_group(pid);
            }
            CommandOutput {
                output,
                exit_code: status.code().unwrap_or(FAILED_EXIT_CODE),
            }
        }
        Ok(Err(e)) => {
            kill_process_group(pid);
            CommandOutput::failed(format!("Failed to wait for command: {}", e))
        }
        Err(_) => {
            warn!(command = %command, timeout_secs, "Command timed out");
            kill_process_group(pid);
            if let Err(e) = child.kill().await {
                debug!(error = %e, "Timed out command already exited");
            }
            let (mut output, _) = drain(stdout, stderr).await;
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&format!("{} {} seconds", TIMEOUT_NOTICE, timeout_secs));
            CommandOutput::failed(output)
        }
    }
}

/// Parameters for the run_command tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunCommandParams {
    /// The shell command to execute.
    command: String,
    /// Optional timeout in seconds.
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

/// Tool for executing shell commands in the working directory.
#[derive(Debug, Default)]
pub struct RunCommandTool;

impl RunCommandTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the repository root. Returns combined stdout and stderr and the exit code. Use for running tests, listing files and searching code."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Maximum execution time in seconds",
                    "minimum": 1
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<ToolOutcome, ToolError> {
        let params: RunCommandParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        if params.command.trim().is_empty() {
            return Err(ToolError::InvalidParameters(
                "Command cannot be empty".to_string(),
            ));
        }

        let timeout_secs = params
            .timeout_seconds
            .filter(|t| *t > 0)
            .unwrap_or(ctx.default_timeout);

        let output = run_command(&params.command, &ctx.working_dir, timeout_secs).await;
        Ok(ToolOutcome::from_command(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_combines_streams() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command("echo out; echo err 1>&2", dir.path(), 10).await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "out\nerr\n");
    }

    #[tokio::test]
    async fn test_run_command_uses_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let result = run_command("cat marker.txt", dir.path(), 10).await;
        assert_eq!(result.output, "here");
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command("exit 3", dir.path(), 10).await;
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_run_command_missing_dir_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let result = run_command("true", &missing, 10).await;
        assert_eq!(result.exit_code, FAILED_EXIT_CODE);
        assert!(result.output.contains("Failed to start command"));
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command("echo started; exec sleep 30", dir.path(), 1).await;
        assert_eq!(result.exit_code, FAILED_EXIT_CODE);
        assert!(result.output.contains("started"));
        assert!(result.output.contains("timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn test_run_command_timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let start = std::time::Instant::now();
        let result = run_command("sleep 30 & sleep 30", dir.path(), 1).await;
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(result.exit_code, FAILED_EXIT_CODE);
        assert!(result.output.starts_with(TIMEOUT_NOTICE));
    }

    #[tokio::test]
    async fn test_run_command_background_process_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let start = std::time::Instant::now();
        let result = run_command("sleep 8 & echo started", dir.path(), 1).await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "started\n");
    }

    #[tokio::test]
    async fn test_run_command_detached_process_with_redirect_returns_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let start = std::time::Instant::now();
        let result = run_command("sleep 8 > /dev/null 2>&1 & echo ok", dir.path(), 10).await;
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(result.output, "ok\n");
    }

    #[tokio::test]
    async fn test_tool_rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::new(dir.path());
        let err = RunCommandTool::new()
            .execute(serde_json::json!({"command": "  "}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_tool_reports_failure_as_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::new(dir.path());
        let outcome = RunCommandTool::new()
            .execute(serde_json::json!({"command": "echo nope; exit 1"}), &ctx)
            .await
            .unwrap();
        assert!(outcome.is_error);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.output, "nope\n");
    }
}
