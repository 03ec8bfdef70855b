//! Child process execution with a timeout and captured output.

use std::{ffi::OsStr, process::Stdio, time::Duration};

use {
    tokio::process::Command,
    tracing::{debug, warn},
};

use crate::error::{Error, Result};

/// Captured output of a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program` with `args`, no shell involved, killing it after `timeout`.
pub async fn run_tool<I, S>(program: &str, args: I, timeout: Duration) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, timeout_secs = timeout.as_secs(), "running tool");
    let child = cmd.spawn().map_err(|e| Error::spawn(program, e))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code().unwrap_or(-1);
            let result = ToolOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code,
            };
            debug!(
                program,
                exit_code,
                stdout_len = result.stdout.len(),
                stderr_len = result.stderr.len(),
                "tool finished"
            );
            Ok(result)
        },
        Ok(Err(e)) => Err(Error::spawn(program, e)),
        Err(_) => {
            warn!(program, "tool timed out");
            Err(Error::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            })
        },
    }
}

/// Pick the line of `stderr` that best explains a failure: the last `ERROR:`
/// line if any, otherwise the last non-empty line.
#[must_use]
pub fn failure_message(stderr: &str, exit_code: i32) -> String {
    let lines = || stderr.lines().map(str::trim).filter(|l| !l.is_empty());
    lines()
        .rfind(|l| l.starts_with("ERROR:"))
        .or_else(|| lines().next_back())
        .map(String::from)
        .unwrap_or_else(|| format!("exited with status {exit_code}"))
}
