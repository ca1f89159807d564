//! Remote command execution

pub mod local;
pub mod ssh;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use crate::errors::ReleaseError;

/// Output of one command on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub host: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into `ReleaseError::CommandFailed`
    pub fn check(self, command: &str) -> Result<Self, ReleaseError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ReleaseError::CommandFailed {
                host: self.host,
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs one shell command line on every target host
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `command` in a fresh shell on each host.
    ///
    /// Resolves once every host has finished, with one output per host.
    /// A non-zero exit or transport failure on any host is an error.
    async fn execute(&self, command: &str) -> Result<Vec<CommandOutput>, ReleaseError>;
}

#[async_trait]
impl<T: RemoteExecutor + ?Sized> RemoteExecutor for Arc<T> {
    async fn execute(&self, command: &str) -> Result<Vec<CommandOutput>, ReleaseError> {
        (**self).execute(command).await
    }
}

/// Trimmed stdout shared by every host.
///
/// Empty when no host printed anything; `HostsOutOfSync` when hosts disagree.
pub fn unanimous_stdout(outputs: &[CommandOutput]) -> Result<String, ReleaseError> {
    let mut values = outputs.iter().map(|o| (o.host.as_str(), o.stdout.trim()));

    let Some((_, first)) = values.next() else {
        return Ok(String::new());
    };

    if values.clone().all(|(_, value)| value == first) {
        return Ok(first.to_string());
    }

    let detail = outputs
        .iter()
        .map(|o| format!("{}={:?}", o.host, o.stdout.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    Err(ReleaseError::HostsOutOfSync(detail))
}

/// Spawn a process and collect its output, bounded by `timeout` when given.
pub(crate) async fn run_process(
    host: &str,
    mut cmd: Command,
    command: &str,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ReleaseError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| ReleaseError::Timeout {
                host: host.to_string(),
                command: command.to_string(),
                secs: limit.as_secs(),
            })?,
        None => cmd.output().await,
    }
    .map_err(|e| ReleaseError::Transport {
        host: host.to_string(),
        message: e.to_string(),
    })?;

    Ok(CommandOutput {
        host: host.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        // killed by a signal
        exit_code: output.status.code().unwrap_or(-1),
    })
}
