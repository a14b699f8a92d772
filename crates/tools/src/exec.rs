//! `run_command` / `run_tests` / `run_lint` / `run_build` — one shared
//! fire-and-wait executor keyed by the literal shell command. Unlike the
//! Terminal surface (`terminal.rs`), there is no background session here:
//! the action blocks until the command exits, is cancelled, or times out.

use std::path::Path;
use std::time::{Duration, Instant};

use ae_domain::error::{Error, Result};
use serde::Serialize;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Output above this size per stream is truncated.
const OUTPUT_CAP_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration_ms: u64,
}

/// Run `command` in a shell rooted at `cwd` (already validated to lie
/// inside the workspace by the caller). Races the child against the
/// given `cancel` token and `timeout`; on either, the child is killed and
/// the outcome reports the partial output collected so far.
pub async fn run_command(
    command: &str,
    cwd: &Path,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<CommandOutcome> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.current_dir(cwd);
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::ToolIo(format!("failed to spawn '{command}': {e}")))?;

    let mut stdout = child.stdout.take().map(BufReader::new);
    let mut stderr = child.stderr.take().map(BufReader::new);

    let start = Instant::now();

    let wait_fut = async {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let out_read = async {
            if let Some(r) = stdout.as_mut() {
                let _ = r.read_to_end(&mut out_buf).await;
            }
        };
        let err_read = async {
            if let Some(r) = stderr.as_mut() {
                let _ = r.read_to_end(&mut err_buf).await;
            }
        };
        let (status, _, _) = tokio::join!(child.wait(), out_read, err_read);
        (status, out_buf, err_buf)
    };

    tokio::select! {
        (status, out_buf, err_buf) = wait_fut => {
            let (stdout, stdout_truncated) = cap_output(out_buf);
            let (stderr, stderr_truncated) = cap_output(err_buf);
            let exit_code = status.ok().and_then(|s| s.code());
            Ok(CommandOutcome {
                command: command.to_string(),
                exit_code,
                stdout,
                stderr,
                stdout_truncated,
                stderr_truncated,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            Err(Error::ToolCancelled)
        }
        _ = tokio::time::sleep(timeout) => {
            let _ = child.kill().await;
            Err(Error::ToolTimeout(timeout.as_secs()))
        }
    }
}

fn cap_output(buf: Vec<u8>) -> (String, bool) {
    let truncated = buf.len() > OUTPUT_CAP_BYTES;
    let text = String::from_utf8_lossy(&buf[..buf.len().min(OUTPUT_CAP_BYTES)]).into_owned();
    (text, truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let outcome = run_command("echo hi", Path::new("."), Duration::from_secs(5), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout.trim(), "hi");
    }

    #[tokio::test]
    async fn captures_nonzero_exit_code() {
        let outcome = run_command("exit 3", Path::new("."), Duration::from_secs(5), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[tokio::test]
    async fn times_out_long_running_commands() {
        let result = run_command("sleep 5", Path::new("."), Duration::from_millis(50), CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::ToolTimeout(_))));
    }

    #[tokio::test]
    async fn cancellation_token_aborts_the_command() {
        let token = CancellationToken::new();
        let child_token = token.clone();
        token.cancel();
        let result = run_command("sleep 5", Path::new("."), Duration::from_secs(5), child_token).await;
        assert!(matches!(result, Err(Error::ToolCancelled)));
    }
}
