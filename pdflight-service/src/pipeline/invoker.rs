//! Runs a single external tool with a hard timeout.
//!
//! Each tool is started as the leader of its own process group, so a timeout
//! takes down everything it spawned (ocrmypdf forks tesseract and gs), not
//! just the direct child.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::telemetry;

use super::plan::ToolStep;

/// Captured output kept for diagnostics, in characters.
const DIAGNOSTICS_TAIL: usize = 2000;

struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Run `step` and verify it produced a non-empty output file.
///
/// On timeout the tool's whole process group is killed and the child reaped
/// before this returns.
pub async fn run_step(step: &ToolStep, timeout: Duration) -> Result<Duration, ToolError> {
    let tool = step.tool.name();
    debug!(tool, command = %step.command_line(), "Running tool");

    let mut command = std::process::Command::new(&step.program);
    command
        .args(&step.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    let mut child = Command::from(command)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn { tool, source })?;

    let started = Instant::now();
    let output = match tokio::time::timeout(timeout, capture(&mut child)).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            kill_group(tool, &mut child).await;
            return Err(ToolError::Wait { tool, source });
        }
        Err(_) => {
            warn!(tool, timeout_secs = timeout.as_secs(), "Tool timed out, killing it");
            kill_group(tool, &mut child).await;
            return Err(ToolError::Timeout {
                tool,
                after: timeout,
            });
        }
    };
    let elapsed = started.elapsed();
    telemetry::record_tool_duration(tool, elapsed);

    if !output.status.success() {
        let diagnostics = diagnostics(&output.stderr, &output.stdout);
        warn!(
            tool,
            status = %output.status,
            elapsed_ms = elapsed.as_millis() as u64,
            diagnostics = %diagnostics,
            "Tool failed"
        );
        return Err(ToolError::NonZeroExit {
            tool,
            status: output.status.to_string(),
            diagnostics,
        });
    }

    match tokio::fs::metadata(&step.output).await {
        Ok(meta) if meta.len() > 0 => {
            debug!(
                tool,
                elapsed_ms = elapsed.as_millis() as u64,
                output_bytes = meta.len(),
                "Tool finished"
            );
            Ok(elapsed)
        }
        _ => {
            warn!(tool, output = %step.output.display(), "Tool exited cleanly without output");
            Err(ToolError::MissingOutput { tool })
        }
    }
}

/// Wait for exit while draining both pipes.
///
/// Borrows the child so it stays unreaped if this future is dropped; its pid
/// then still names the process group.
async fn capture(child: &mut Child) -> io::Result<Captured> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::try_join!(read_pipe(stdout), read_pipe(stderr))?;
    let status = child.wait().await?;
    Ok(Captured {
        status,
        stdout,
        stderr,
    })
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// SIGKILL the child's process group, then reap the child.
async fn kill_group(tool: &'static str, child: &mut Child) {
    if let Some(pid) = child.id() {
        match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!(tool, pid, error = %e, "Failed to kill tool process group"),
        }
    }
    if let Err(e) = child.kill().await {
        debug!(tool, error = %e, "Tool already gone");
    }
}

/// Prefer stderr; fall back to stdout. Keeps only the tail.
fn diagnostics(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    let text = if !stderr.trim().is_empty() {
        stderr.trim()
    } else if !stdout.trim().is_empty() {
        stdout.trim()
    } else {
        "Command failed"
    };
    tail(text, DIAGNOSTICS_TAIL)
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::plan::Tool;
    use std::ffi::OsString;
    use std::path::Path;

    fn shell_step(script: &str, output: &Path) -> ToolStep {
        ToolStep {
            tool: Tool::Qpdf,
            program: "sh".to_string(),
            args: vec![
                OsString::from("-c"),
                OsString::from(script),
                OsString::from("sh"),
                output.as_os_str().to_owned(),
            ],
            output: output.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_success_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let step = shell_step(r#"printf '%%PDF-1.4' > "$1""#, &output);

        let result = run_step(&step, Duration::from_secs(10)).await;
        tokio_test::assert_ok!(result);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step("echo 'bad xref table' >&2; exit 3", &dir.path().join("out.pdf"));

        match run_step(&step, Duration::from_secs(10)).await {
            Err(ToolError::NonZeroExit {
                tool, diagnostics, ..
            }) => {
                assert_eq!(tool, "qpdf");
                assert_eq!(diagnostics, "bad xref table");
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_output() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step("exit 0", &dir.path().join("out.pdf"));

        let result = run_step(&step, Duration::from_secs(10)).await;
        assert!(matches!(result, Err(ToolError::MissingOutput { tool: "qpdf" })));
    }

    #[tokio::test]
    async fn test_empty_output_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.pdf");
        let step = shell_step(r#": > "$1""#, &output);

        let result = run_step(&step, Duration::from_secs(10)).await;
        assert!(matches!(result, Err(ToolError::MissingOutput { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step("exec sleep 30", &dir.path().join("out.pdf"));

        let started = Instant::now();
        let result = run_step(&step, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Zombies keep their /proc entry until reaped, so they count as gone.
    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_spawned_children() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");
        let script = format!(r#"sleep 30 & echo $! > '{}'; wait"#, pid_file.display());
        let step = shell_step(&script, &dir.path().join("out.pdf"));

        let result = run_step(&step, Duration::from_millis(500)).await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));

        let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
        let deadline = Instant::now() + Duration::from_secs(5);
        while is_running(&pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!is_running(&pid), "sleep {} outlived the timeout", pid);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut step = shell_step("exit 0", &dir.path().join("out.pdf"));
        step.program = "/nonexistent/pdflight-tool".to_string();

        let result = run_step(&step, Duration::from_secs(10)).await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[test]
    fn test_diagnostics_tail() {
        assert_eq!(diagnostics(b"", b"  from stdout \n"), "from stdout");
        assert_eq!(diagnostics(b"", b""), "Command failed");

        let long = "é".repeat(DIAGNOSTICS_TAIL + 10) + "end";
        let tailed = tail(&long, DIAGNOSTICS_TAIL);
        assert_eq!(tailed.chars().count(), DIAGNOSTICS_TAIL);
        assert!(tailed.ends_with("end"));
    }
}
