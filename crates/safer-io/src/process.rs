//! Running helper programs with a bounded wait.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::error::CommandError;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Split a whitespace-separated command line. No quoting is supported.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next().ok_or(CommandError::Empty)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured output of a successful run.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Run `command` to completion, killing it if `timeout` elapses first.
///
/// A non-zero exit is reported as [`CommandError::Failed`] with stderr.
pub async fn run(
    command: &CommandLine,
    timeout: Option<Duration>,
) -> Result<CommandOutput, CommandError> {
    let start = Instant::now();

    let child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| CommandError::Timeout {
                program: command.program.clone(),
                after: limit,
            })??,
        None => child.wait_with_output().await?,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    debug!(
        program = %command.program,
        status = ?output.status.code(),
        duration_ms,
        "helper exited"
    );

    if !output.status.success() {
        return Err(CommandError::Failed {
            program: command.program.clone(),
            code: output.status.code(),
            stderr,
        });
    }

    Ok(CommandOutput {
        stdout: output.stdout,
        stderr,
        duration_ms,
    })
}
