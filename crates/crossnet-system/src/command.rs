//! Child process helpers.
//!
//! System utilities are executed via `tokio::process::Command` so they never
//! block the async runtime. Every call is bounded by a timeout and the child
//! is killed when the timeout fires.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{Result, SystemError};

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Short description of a failed exit, e.g. "exit status 1".
    pub fn exit_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Run `program` to completion and capture its stdout.
pub async fn run(program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| SystemError::Timeout {
            program: program.to_string(),
            timeout_ms: timeout.as_millis(),
        })?
        .map_err(|e| spawn_error(program, e))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        success: output.status.success(),
        code: output.status.code(),
    })
}

/// Stream `program`'s stdout line by line until `matcher` returns a value.
///
/// For utilities that keep running after printing the answer. Returns
/// `Ok(None)` when the output ends or the timeout fires without a match.
pub async fn first_match<F>(
    program: &str,
    args: &[String],
    timeout: Duration,
    mut matcher: F,
) -> Result<Option<String>>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let stdout = child.stdout.take().ok_or_else(|| {
        SystemError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "child stdout was not captured",
        ))
    })?;
    let mut lines = BufReader::new(stdout).lines();

    let search = async {
        while let Some(line) = lines.next_line().await? {
            if let Some(found) = matcher(&line) {
                return Ok(Some(found));
            }
        }
        Ok::<_, io::Error>(None)
    };

    let found = match tokio::time::timeout(timeout, search).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::debug!(program, timeout_ms = timeout.as_millis(), "No match before timeout");
            None
        }
    };

    if let Err(e) = child.start_kill() {
        tracing::debug!(program, error = %e, "Child already exited");
    }

    Ok(found)
}

fn spawn_error(program: &str, e: io::Error) -> SystemError {
    if e.kind() == io::ErrorKind::NotFound {
        SystemError::CommandNotFound {
            program: program.to_string(),
        }
    } else {
        SystemError::Io(e)
    }
}
