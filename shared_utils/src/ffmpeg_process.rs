//! Subprocess plumbing for the external tools.
//!
//! Two invocation styles are needed:
//! - unbounded blocking calls (frame extraction, re-encode, the upscaler) via
//!   [`run_tool`];
//! - short probe calls (encoder tests, version checks, `nvidia-smi -L`) that
//!   must never hang the startup path, via [`run_with_timeout`].
//!
//! When a command pipes both stdout and stderr but only one side is read, a
//! chatty child can fill the 64KB pipe buffer and deadlock against us. stderr
//! is therefore always drained on its own thread.

use anyhow::{Context, Result};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Outcome of a bounded or unbounded tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run a command to completion, draining both pipes concurrently.
///
/// No timeout: frame extraction, re-encode, and the upscale call block for as
/// long as the external tool needs.
pub fn run_tool(cmd: &mut Command) -> Result<ToolOutput> {
    let command_str = format!("{:?}", cmd);
    info!(command = %command_str, "Executing external tool");

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().context("Failed to spawn external tool")?;

    let stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stderr"))?;
    let stderr_thread = thread::spawn(move || read_pipe(stderr_pipe));

    let stdout = child
        .stdout
        .take()
        .map(read_pipe)
        .unwrap_or_default();

    let status = child.wait().context("Failed to wait for external tool")?;
    let stderr = stderr_thread.join().unwrap_or_default();

    if status.success() {
        debug!(exit_code = status.code(), "Tool completed");
    } else {
        error!(
            command = %command_str,
            exit_code = status.code(),
            stderr_tail = %truncate_diagnostic(&stderr, 500),
            "Tool failed"
        );
    }

    Ok(ToolOutput {
        status,
        stdout,
        stderr,
    })
}

/// Run a command with a hard deadline, killing it on expiry.
///
/// Used for the encoder-probing path only. Polls `try_wait` rather than
/// blocking so the deadline can be enforced without extra dependencies.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<ToolOutput> {
    let command_str = format!("{:?}", cmd);
    debug!(command = %command_str, timeout_secs = timeout.as_secs(), "Executing probe");

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().context("Failed to spawn probe process")?;

    let stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stderr"))?;
    let stderr_thread = thread::spawn(move || read_pipe(stderr_pipe));

    let stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stdout"))?;
    let stdout_thread = thread::spawn(move || read_pipe(stdout_pipe));

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().context("Failed to poll probe process")? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!("Probe timed out after {:?}: {}", timeout, command_str);
            }
            None => thread::sleep(Duration::from_millis(25)),
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    Ok(ToolOutput {
        status,
        stdout,
        stderr,
    })
}

fn read_pipe<R: Read>(mut pipe: R) -> String {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Extract the most meaningful line from a tool's stderr output.
///
/// 1. Prefer the last line containing "Error"/"error"
/// 2. Otherwise the last non-empty, non-progress line
/// 3. Otherwise a fixed placeholder
pub fn format_tool_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown tool error".to_string())
}

/// Keep the tail of a diagnostic, where tools put the actual failure reason.
///
/// Truncation is char-aligned so multi-byte output never splits.
pub fn truncate_diagnostic(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    let tail: String = trimmed
        .chars()
        .skip(count - max_chars)
        .collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tool_error_with_error_line() {
        let stderr = "\nframe=  100 fps=25.0 q=28.0 size= 1024kB\n[h264_nvenc @ 0x7f] Error: no capable devices\n";
        let error = format_tool_error(stderr);
        assert!(error.contains("Error"));
        assert!(error.contains("no capable devices"));
    }

    #[test]
    fn test_format_tool_error_no_error_line() {
        let stderr = "\nframe=  100 fps=25.0\nConversion failed!\n";
        assert_eq!(format_tool_error(stderr), "Conversion failed!");
    }

    #[test]
    fn test_format_tool_error_empty() {
        assert_eq!(format_tool_error(""), "Unknown tool error");
    }

    #[test]
    fn test_truncate_diagnostic_short_text_unchanged() {
        assert_eq!(truncate_diagnostic("  short  ", 100), "short");
    }

    #[test]
    fn test_truncate_diagnostic_keeps_tail() {
        let text = "a".repeat(50) + "actual failure reason";
        let truncated = truncate_diagnostic(&text, 21);
        assert_eq!(truncated, "...actual failure reason");
    }

    #[test]
    fn test_truncate_diagnostic_multibyte_safe() {
        let text = "프레임 처리 실패".repeat(40);
        let truncated = truncate_diagnostic(&text, 30);
        assert!(truncated.starts_with("..."));
        assert!(truncated.chars().count() <= 33);
    }

    #[test]
    fn test_run_with_timeout_kills_slow_process() {
        let mut cmd = Command::new("sleep");
        cmd.arg("10");
        let start = Instant::now();
        let result = run_with_timeout(&mut cmd, Duration::from_millis(200));
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_run_with_timeout_captures_output() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let output = run_with_timeout(&mut cmd, Duration::from_secs(5)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }
}
