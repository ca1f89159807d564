//! Promote a finished release to `current`

use tracing::info;

use crate::deploy::commands;
use crate::deploy::events::{EventBus, PipelineEvent};
use crate::deploy::state::DeploymentState;
use crate::errors::ReleaseError;
use crate::history::{CURRENT_LINK, RELEASES_DIR};
use crate::release::{join_remote, ReleaseName};
use crate::remote::RemoteExecutor;

/// Swaps the `current` symlink over to a release whose REVISION was recorded
pub struct Publisher<E> {
    executor: E,
    deploy_to: String,
    events: EventBus,
}

impl<E: RemoteExecutor> Publisher<E> {
    pub fn new(executor: E, deploy_to: impl Into<String>) -> Self {
        Self {
            executor,
            deploy_to: deploy_to.into(),
            events: EventBus::new(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Point `current` at the release built by a successful update
    pub async fn publish(&self, state: &DeploymentState) -> Result<ReleaseName, ReleaseError> {
        let release = match (state.release_dirname(), state.is_complete()) {
            (Some(release), true) => release.clone(),
            (Some(release), false) => {
                return Err(ReleaseError::IncompleteRelease(format!(
                    "release {} has no recorded revision",
                    release
                )))
            }
            (None, _) => {
                return Err(ReleaseError::IncompleteRelease(
                    "no release was created".to_string(),
                ))
            }
        };

        let target = join_remote(RELEASES_DIR, release.as_str());
        info!("Publishing release {}", release);
        self.executor
            .execute(&commands::swap_symlink(&self.deploy_to, &target, CURRENT_LINK))
            .await?;
        info!("Release published.");

        self.events.emit(PipelineEvent::Published);
        Ok(release)
    }
}
