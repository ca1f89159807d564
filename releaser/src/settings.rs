//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::deploy::pipeline::{PipelineConfig, DEFAULT_REMOTE_NAME};
use crate::errors::ReleaseError;
use crate::logs::{LogLevel, LogOptions};
use crate::remote::ssh::{SshOptions, SshTarget};

/// Default settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "releaser.json";

/// Releaser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Deploy root on the servers
    pub deploy_to: String,

    /// Repository URL fetched into each release
    pub repository_url: String,

    /// Branch to deploy
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Git remote name inside each release
    #[serde(default = "default_remote_name")]
    pub remote_name: String,

    /// Servers as `user@host[:port]`
    #[serde(default)]
    pub servers: Vec<String>,

    /// SSH configuration
    #[serde(default)]
    pub ssh: SshOptions,

    /// Log output configuration
    #[serde(default)]
    pub log: LogSettings,
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_remote_name() -> String {
    DEFAULT_REMOTE_NAME.to_string()
}

/// Log output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// Emit JSON lines instead of plain text
    #[serde(default)]
    pub json_format: bool,

    /// Also write a daily rolling log file here
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Read and validate a settings file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ReleaseError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).await.map_err(|e| {
            ReleaseError::ConfigError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ReleaseError> {
        let settings: Settings = serde_json::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ReleaseError> {
        let required = [
            ("deploy_to", &self.deploy_to),
            ("repository_url", &self.repository_url),
            ("branch", &self.branch),
            ("remote_name", &self.remote_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ReleaseError::ConfigError(format!("{} must not be empty", key)));
            }
        }

        if self.servers.is_empty() {
            return Err(ReleaseError::ConfigError(
                "at least one server is required".to_string(),
            ));
        }
        self.targets()?;
        Ok(())
    }

    pub fn targets(&self) -> Result<Vec<SshTarget>, ReleaseError> {
        self.servers.iter().map(|s| s.parse()).collect()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            deploy_to: self.deploy_to.clone(),
            repository_url: self.repository_url.clone(),
            branch: self.branch.clone(),
            remote_name: self.remote_name.clone(),
        }
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level.clone(),
            log_dir: self.log.log_dir.clone(),
            json_format: self.log.json_format,
            ..Default::default()
        }
    }
}
