//! Release history read back from the servers

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::errors::ReleaseError;
use crate::release::{join_remote, ReleaseName, Revision, REVISION_FILE};
use crate::remote::{unanimous_stdout, RemoteExecutor};
use crate::shell::quote_arg;

/// Name of the symlink pointing at the active release
pub const CURRENT_LINK: &str = "current";

/// Directory holding every release under the deploy root
pub const RELEASES_DIR: &str = "releases";

/// Which release is active and what each release recorded.
///
/// "Nothing found" is `Ok(None)`, never an error.
#[async_trait]
pub trait ReleaseHistory: Send + Sync {
    /// Directory name of the currently active release
    async fn current_release_name(&self) -> Result<Option<ReleaseName>, ReleaseError>;

    /// Revision recorded in the `REVISION` file of `release`
    async fn revision_of(&self, release: &ReleaseName) -> Result<Option<Revision>, ReleaseError>;
}

/// History backed by the `current` symlink and `REVISION` files on the servers
pub struct RemoteReleaseHistory<E> {
    executor: E,
    deploy_to: String,
}

impl<E: RemoteExecutor> RemoteReleaseHistory<E> {
    pub fn new(executor: E, deploy_to: impl Into<String>) -> Self {
        Self {
            executor,
            deploy_to: deploy_to.into(),
        }
    }

    fn current_path(&self) -> String {
        join_remote(&self.deploy_to, CURRENT_LINK)
    }

    fn revision_path(&self, release: &ReleaseName) -> String {
        let releases = join_remote(&self.deploy_to, RELEASES_DIR);
        join_remote(&join_remote(&releases, release.as_str()), REVISION_FILE)
    }
}

#[async_trait]
impl<E: RemoteExecutor> ReleaseHistory for RemoteReleaseHistory<E> {
    async fn current_release_name(&self) -> Result<Option<ReleaseName>, ReleaseError> {
        let current = quote_arg(&self.current_path());
        let command = format!("if [ -h {0} ]; then readlink {0}; fi", current);

        let outputs = self.executor.execute(&command).await?;
        let target = unanimous_stdout(&outputs)?;
        if target.is_empty() {
            info!("No current release found");
            return Ok(None);
        }

        let name = ReleaseName::from_path(&target)?;
        if !name.is_timestamped() {
            warn!("Current release {} is not a timestamped release name", name);
        }
        debug!("Current release points at {}", target);
        Ok(Some(name))
    }

    async fn revision_of(&self, release: &ReleaseName) -> Result<Option<Revision>, ReleaseError> {
        let file = quote_arg(&self.revision_path(release));
        let command = format!("if [ -f {0} ]; then cat {0} 2>/dev/null; fi;", file);

        let outputs = self.executor.execute(&command).await?;
        let revision = Revision::from_output(&unanimous_stdout(&outputs)?);
        if revision.is_none() {
            debug!("No revision recorded for release {}", release);
        }
        Ok(revision)
    }
}
