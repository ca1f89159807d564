//! SSH executor fanning one command out to every server

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::ReleaseError;
use crate::remote::local::run_local;
use crate::remote::{run_process, CommandOutput, RemoteExecutor};

/// ssh reserves exit status 255 for its own errors
const SSH_TRANSPORT_EXIT: i32 = 255;

/// SSH connection options shared by every server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshOptions {
    /// Default port for servers that do not name one
    #[serde(default = "default_port")]
    pub port: u16,

    /// Private key passed with `-i`
    #[serde(default)]
    pub identity_file: Option<String>,

    /// `ConnectTimeout` in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a single command, unbounded when absent
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: default_port(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: None,
        }
    }
}

/// One server, written `user@host:port`, `user@host` or `host`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl SshTarget {
    /// Whether commands for this target can skip ssh entirely
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }

    /// `user@host` as passed to ssh
    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.destination())?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

impl FromStr for SshTarget {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (user, rest) = match s.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(ReleaseError::ConfigError(format!("Empty user in server: {}", s))),
            None => (None, s),
        };

        // Bare IPv6 addresses carry colons of their own
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ReleaseError::ConfigError(format!("Invalid port in server: {}", s)))?;
                (host, Some(port))
            }
            _ => (rest, None),
        };

        if host.is_empty() {
            return Err(ReleaseError::ConfigError(format!("Empty host in server: {}", s)));
        }

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }
}

/// Executes commands over ssh on every configured server concurrently
#[derive(Debug, Clone)]
pub struct SshExecutor {
    targets: Vec<SshTarget>,
    options: SshOptions,
}

impl SshExecutor {
    pub fn new(targets: Vec<SshTarget>, options: SshOptions) -> Result<Self, ReleaseError> {
        if targets.is_empty() {
            return Err(ReleaseError::ConfigError("No servers configured".to_string()));
        }
        Ok(Self { targets, options })
    }

    fn command_timeout(&self) -> Option<Duration> {
        self.options.command_timeout_secs.map(Duration::from_secs)
    }

    /// Argument list for `ssh`, without the program name
    pub fn ssh_args(&self, target: &SshTarget, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.options.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        let port = target.port.unwrap_or(self.options.port);
        if port != 22 {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.options.connect_timeout_secs),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
        ]);

        args.push(target.destination());
        args.push(command.to_string());
        args
    }

    async fn execute_on(
        &self,
        target: &SshTarget,
        command: &str,
    ) -> Result<CommandOutput, ReleaseError> {
        let host = target.to_string();

        if target.is_local() {
            return run_local(&host, command, self.command_timeout())
                .await?
                .check(command);
        }

        debug!("[{}] {}", host, command);
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args(target, command));
        let output = run_process(&host, cmd, command, self.command_timeout()).await?;

        if output.exit_code == SSH_TRANSPORT_EXIT {
            warn!("[{}] ssh connection failed", host);
            return Err(ReleaseError::Transport {
                host,
                message: output.stderr.trim().to_string(),
            });
        }

        output.check(command)
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, command: &str) -> Result<Vec<CommandOutput>, ReleaseError> {
        let results = join_all(
            self.targets
                .iter()
                .map(|target| self.execute_on(target, command)),
        )
        .await;

        results.into_iter().collect()
    }
}
