// Interpreter selection and child process plumbing shared by the adapters

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use procman_core::domain::ShellDialect;
use procman_core::port::{ChannelError, CommandOutput};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::debug;

/// PowerShell binary on this platform
pub fn powershell_program() -> &'static str {
    if cfg!(windows) {
        "powershell"
    } else {
        "pwsh"
    }
}

/// Local interpreter invocation running `script` in `dialect`
pub fn local_command(dialect: ShellDialect, script: &str) -> Command {
    match dialect {
        ShellDialect::PowerShell => {
            let mut cmd = Command::new(powershell_program());
            cmd.args(["-NoProfile", "-NonInteractive", "-Command", script]);
            cmd
        }
        ShellDialect::Posix => {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", script]);
            cmd
        }
    }
}

/// Base64 of the UTF-16LE bytes of `script`, as `-EncodedCommand` expects
pub fn encode_powershell(script: &str) -> String {
    let bytes: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    STANDARD.encode(bytes)
}

/// Command line a remote login shell runs for `script`
pub fn remote_line(dialect: ShellDialect, script: &str) -> String {
    match dialect {
        ShellDialect::PowerShell => format!(
            "powershell -NoProfile -NonInteractive -EncodedCommand {}",
            encode_powershell(script)
        ),
        ShellDialect::Posix => script.to_string(),
    }
}

/// How long pipes may stay open after the child exited
///
/// A job the script backgrounded inherits stdout/stderr and can hold them open
/// for its whole lifetime; output is only collected up to this grace period.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Spawn `cmd` and collect its output
///
/// Completion is the child's exit, not EOF on its pipes. Spawn and wait
/// failures are faults; the exit status is data.
pub async fn run_captured(
    mut cmd: Command,
    limit: Option<Duration>,
) -> Result<CommandOutput, ChannelError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ChannelError::Io(format!("spawn failed: {}", e)))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let run = collect(&mut child, &mut stdout, &mut stderr);
    let status = match limit {
        Some(limit) => timeout(limit, run)
            .await
            .map_err(|_| ChannelError::Io(format!("timed out after {} ms", limit.as_millis())))?,
        None => run.await,
    }
    .map_err(|e| ChannelError::Io(e.to_string()))?;

    let output = CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        exit_code: status.code(),
    };
    debug!(exit_code = ?output.exit_code, stdout_len = %output.stdout.len(), "Child finished");
    Ok(output)
}

async fn collect(
    child: &mut Child,
    stdout: &mut Vec<u8>,
    stderr: &mut Vec<u8>,
) -> std::io::Result<ExitStatus> {
    let out_pipe = child.stdout.take();
    let err_pipe = child.stderr.take();

    let readers = async {
        tokio::join!(drain(out_pipe, stdout), drain(err_pipe, stderr));
    };
    tokio::pin!(readers);

    let mut drained = false;
    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = &mut readers, if !drained => drained = true,
        }
    };

    if !drained && timeout(PIPE_DRAIN_GRACE, &mut readers).await.is_err() {
        debug!("Pipes still held open after exit, output truncated");
    }
    Ok(status)
}

// Chunked reads keep everything received so far if the caller stops waiting
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: &mut Vec<u8>) {
    let Some(mut pipe) = pipe else {
        return;
    };
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_powershell_is_utf16le() {
        assert_eq!(encode_powershell("a"), "YQA=");
        assert_eq!(encode_powershell("dir"), "ZABpAHIA");
    }

    #[test]
    fn test_remote_line() {
        assert_eq!(remote_line(ShellDialect::Posix, "hostname"), "hostname");
        let line = remote_line(ShellDialect::PowerShell, "a");
        assert_eq!(line, "powershell -NoProfile -NonInteractive -EncodedCommand YQA=");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captured_keeps_exit_code() {
        let output = run_captured(local_command(ShellDialect::Posix, "echo out; echo err >&2; exit 3"), None)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.succeeded());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captured_times_out() {
        let result = run_captured(
            local_command(ShellDialect::Posix, "sleep 5"),
            Some(Duration::from_millis(100)),
        )
        .await;
        assert!(matches!(result, Err(ChannelError::Io(msg)) if msg.contains("timed out")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_background_job_does_not_hold_the_call() {
        let started = std::time::Instant::now();
        let output = run_captured(
            local_command(ShellDialect::Posix, "echo launched; sleep 30 &"),
            None,
        )
        .await
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "launched");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_fault() {
        let result = run_captured(Command::new("/nonexistent/procman-shell"), None).await;
        assert!(matches!(result, Err(ChannelError::Io(_))));
    }
}
