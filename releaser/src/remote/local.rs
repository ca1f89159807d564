//! Local shell executor

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ReleaseError;
use crate::remote::{run_process, CommandOutput, RemoteExecutor};

pub const LOCAL_HOST: &str = "localhost";

/// Runs commands through `sh -c` on this machine
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    timeout: Option<Duration>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn execute(&self, command: &str) -> Result<Vec<CommandOutput>, ReleaseError> {
        let output = run_local(LOCAL_HOST, command, self.timeout).await?;
        Ok(vec![output.check(command)?])
    }
}

pub(crate) async fn run_local(
    host: &str,
    command: &str,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ReleaseError> {
    debug!("[{}] sh -c {}", host, command);
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    run_process(host, cmd, command, timeout).await
}
