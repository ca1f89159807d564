//! Error types for releaser

use thiserror::Error;

/// Main error type for a release run
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Command failed on {host} (exit code {exit_code}): {command}: {stderr}")]
    CommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Transport error on {host}: {message}")]
    Transport { host: String, message: String },

    #[error("Command timed out on {host} after {secs}s: {command}")]
    Timeout {
        host: String,
        command: String,
        secs: u64,
    },

    #[error("Remote servers are not synced: {0}")]
    HostsOutOfSync(String),

    #[error("Invalid release name: {0}")]
    InvalidReleaseName(String),

    #[error("Deployment state already set: {0}")]
    StateAlreadySet(&'static str),

    #[error("Incomplete release: {0}")]
    IncompleteRelease(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl ReleaseError {
    /// Whether the error came from the remote side rather than local bookkeeping
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ReleaseError::CommandFailed { .. }
                | ReleaseError::Transport { .. }
                | ReleaseError::Timeout { .. }
        )
    }
}
