//! Running external command-line tools.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::error::ProcessorError;

/// Lines of stderr kept in tool failure errors.
const STDERR_TAIL_LINES: usize = 20;

/// Captured output of a successful tool run.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub stdout: Vec<u8>,
}

/// Runs `program` with `args`, bounded by `timeout_secs`.
///
/// A missing binary maps to [`ProcessorError::ToolNotFound`]; a non-zero
/// exit maps to [`ProcessorError::ToolFailed`] carrying the stderr tail.
/// On timeout the child is killed.
pub(crate) async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<ToolOutput, ProcessorError> {
    let start = Instant::now();
    debug!(tool = %tool, args = ?args, "Running tool");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessorError::ToolNotFound {
                    tool: tool.to_string(),
                    path: program.to_path_buf(),
                }
            } else {
                ProcessorError::Io(e)
            }
        })?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(ProcessorError::Timeout {
                tool: tool.to_string(),
                timeout_secs,
            })
        }
    };

    debug!(
        tool = %tool,
        status = ?output.status.code(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Tool finished"
    );

    if !output.status.success() {
        let tail = stderr_tail(&String::from_utf8_lossy(&output.stderr));
        return Err(ProcessorError::tool_failed(
            tool,
            format!("exited with code {:?}: {}", output.status.code(), last_line(&tail)),
            if tail.is_empty() { None } else { Some(tail) },
        ));
    }

    Ok(ToolOutput {
        stdout: output.stdout,
    })
}

/// Checks that a tool binary can be spawned.
pub(crate) async fn check_tool(tool: &str, program: &Path, version_arg: &str) -> Result<(), ProcessorError> {
    match Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProcessorError::ToolNotFound {
            tool: tool.to_string(),
            path: program.to_path_buf(),
        }),
        Err(e) => Err(ProcessorError::Io(e)),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn last_line(text: &str) -> &str {
    text.lines().last().unwrap_or("no error output")
}

/// Path argument as a string for command lines.
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
