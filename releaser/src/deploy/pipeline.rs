//! Release pipeline: new timestamped release with a git checkout of one branch

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::deploy::commands;
use crate::deploy::events::{EventBus, PipelineEvent};
use crate::deploy::fsm::{ReleaseEvent, ReleaseFsm, ReleaseStage};
use crate::deploy::state::DeploymentState;
use crate::errors::ReleaseError;
use crate::history::{ReleaseHistory, RELEASES_DIR};
use crate::release::{join_remote, ReleaseName, Revision};
use crate::remote::{unanimous_stdout, RemoteExecutor};

/// Remote name used when the configuration does not set one
pub const DEFAULT_REMOTE_NAME: &str = "deploy";

/// What to deploy and where
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Deploy root on the servers; releases live in `<deploy_to>/releases`
    pub deploy_to: String,

    /// Repository the release is fetched from
    pub repository_url: String,

    /// Branch checked out in the release
    pub branch: String,

    /// Name the repository is registered under inside each release
    pub remote_name: String,
}

impl PipelineConfig {
    pub fn new(
        deploy_to: impl Into<String>,
        repository_url: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            deploy_to: deploy_to.into(),
            repository_url: repository_url.into(),
            branch: branch.into(),
            remote_name: DEFAULT_REMOTE_NAME.to_string(),
        }
    }

    pub fn releases_path(&self) -> String {
        join_remote(&self.deploy_to, RELEASES_DIR)
    }
}

/// Outcome of one pipeline run
#[derive(Debug)]
pub struct ReleaseRun {
    pub state: DeploymentState,
    fsm: ReleaseFsm,
    error: Option<ReleaseError>,
}

impl ReleaseRun {
    /// Stage the run ended in, `Completed` or `Failed`
    pub fn stage(&self) -> ReleaseStage {
        self.fsm.stage()
    }

    /// Last stage reached before a failure
    pub fn failed_at(&self) -> Option<ReleaseStage> {
        self.fsm.failed_at()
    }

    pub fn error(&self) -> Option<&ReleaseError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<DeploymentState, ReleaseError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.state),
        }
    }
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Runs the update sequence against one executor and one release history
pub struct ReleasePipeline<E, H> {
    config: PipelineConfig,
    executor: E,
    history: H,
    events: EventBus,
    clock: Clock,
}

impl<E: RemoteExecutor, H: ReleaseHistory> ReleasePipeline<E, H> {
    pub fn new(config: PipelineConfig, executor: E, history: H) -> Self {
        Self {
            config,
            executor,
            history,
            events: EventBus::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the UTC clock used to name the release
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Share an event bus with other operations
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Create a new release and check out the configured branch in it.
    ///
    /// Emits `PipelineEvent::Updated` once on success. On failure the
    /// partially built release directory stays on the servers and nothing
    /// is emitted.
    pub async fn update(&self) -> Result<DeploymentState, ReleaseError> {
        self.run().await.into_result()
    }

    /// Same as `update`, but keeps what the run learned when it fails
    pub async fn run(&self) -> ReleaseRun {
        let mut state = DeploymentState::new();
        let mut fsm = ReleaseFsm::new();

        let result = match self.run_steps(&mut state, &mut fsm).await {
            Ok(()) => fsm.process(ReleaseEvent::Advance).map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!(
                    "Release {} updated to revision {}",
                    display_opt(state.release_dirname()),
                    display_opt(state.current_revision())
                );
                self.events.emit(PipelineEvent::Updated);
                ReleaseRun {
                    state,
                    fsm,
                    error: None,
                }
            }
            Err(e) => {
                // the run is over either way, keep the original error
                let _ = fsm.process(ReleaseEvent::Fail(e.to_string()));
                error!(
                    "Release failed after {:?}: {}",
                    fsm.failed_at().unwrap_or(ReleaseStage::Start),
                    e
                );
                ReleaseRun {
                    state,
                    fsm,
                    error: Some(e),
                }
            }
        }
    }

    async fn run_steps(
        &self,
        state: &mut DeploymentState,
        fsm: &mut ReleaseFsm,
    ) -> Result<(), ReleaseError> {
        self.set_previous_release(state).await?;
        fsm.process(ReleaseEvent::Advance)?;

        self.set_previous_revision(state).await?;
        fsm.process(ReleaseEvent::Advance)?;

        let release_path = self.create_release_path(state).await?;
        fsm.process(ReleaseEvent::Advance)?;

        self.init_repository(&release_path).await?;
        fsm.process(ReleaseEvent::Advance)?;

        self.add_remote(&release_path).await?;
        fsm.process(ReleaseEvent::Advance)?;

        self.fetch(&release_path).await?;
        fsm.process(ReleaseEvent::Advance)?;

        self.checkout(&release_path).await?;
        fsm.process(ReleaseEvent::Advance)?;

        self.set_current_revision(state, &release_path).await?;
        fsm.process(ReleaseEvent::Advance)?;

        Ok(())
    }

    async fn set_previous_release(&self, state: &mut DeploymentState) -> Result<(), ReleaseError> {
        let previous = self.history.current_release_name().await?;
        if let Some(release) = &previous {
            info!("Previous release found: {}", release);
        }
        state.set_previous_release(previous);
        Ok(())
    }

    async fn set_previous_revision(&self, state: &mut DeploymentState) -> Result<(), ReleaseError> {
        let Some(previous) = state.previous_release().cloned() else {
            return state.set_previous_revision(None);
        };

        let revision = self.history.revision_of(&previous).await?;
        if let Some(revision) = &revision {
            info!("Previous revision found: {}", revision);
        }
        state.set_previous_revision(revision)
    }

    async fn create_release_path(&self, state: &mut DeploymentState) -> Result<String, ReleaseError> {
        let dirname = ReleaseName::at((self.clock)());
        let release_path = join_remote(&self.config.releases_path(), dirname.as_str());
        state.set_release(dirname, release_path.clone())?;

        info!("Create release path \"{}\"", release_path);
        self.executor
            .execute(&commands::create_release_path(&release_path))
            .await?;
        info!("Release path created.");
        Ok(release_path)
    }

    async fn init_repository(&self, release_path: &str) -> Result<(), ReleaseError> {
        info!("Initialize repository in \"{}\"", release_path);
        self.executor
            .execute(&commands::init_repository(release_path))
            .await?;
        info!("Repository initialized.");
        Ok(())
    }

    async fn add_remote(&self, release_path: &str) -> Result<(), ReleaseError> {
        debug!(
            "Adding remote {} -> {}",
            self.config.remote_name, self.config.repository_url
        );
        self.executor
            .execute(&commands::add_remote(
                release_path,
                &self.config.remote_name,
                &self.config.repository_url,
            ))
            .await?;
        info!("Remote added.");
        Ok(())
    }

    async fn fetch(&self, release_path: &str) -> Result<(), ReleaseError> {
        info!(
            "Fetching repository \"{}\", branch \"{}\"",
            self.config.repository_url, self.config.branch
        );
        self.executor
            .execute(&commands::fetch(
                release_path,
                &self.config.remote_name,
                &self.config.branch,
            ))
            .await?;
        info!("Repository fetched.");
        Ok(())
    }

    async fn checkout(&self, release_path: &str) -> Result<(), ReleaseError> {
        info!("Checking out \"{}\"", self.config.branch);
        self.executor
            .execute(&commands::checkout(release_path, &self.config.branch))
            .await?;
        info!("Branch checked out.");
        Ok(())
    }

    async fn set_current_revision(
        &self,
        state: &mut DeploymentState,
        release_path: &str,
    ) -> Result<(), ReleaseError> {
        info!("Setting current revision and creating revision file.");

        let command = commands::resolve_revision(release_path, &self.config.branch);
        let outputs = self.executor.execute(&command).await?;
        let revision = Revision::from_output(&unanimous_stdout(&outputs)?).ok_or_else(|| {
            ReleaseError::IncompleteRelease(format!(
                "no commit resolved for branch {}",
                self.config.branch
            ))
        })?;

        self.executor
            .execute(&commands::write_revision(release_path, &revision))
            .await?;
        state.set_current_revision(revision)?;
        info!("Revision file created.");
        Ok(())
    }
}

fn display_opt<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}
