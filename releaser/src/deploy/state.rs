//! Per-run deployment state

use serde::Serialize;

use crate::errors::ReleaseError;
use crate::release::{ReleaseName, Revision};

/// Everything one run learns about the previous and the new release.
///
/// Built empty at the start of a run and filled in pipeline order. Write-once
/// fields reject a second assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentState {
    previous_release: Option<ReleaseName>,
    previous_revision: Option<Revision>,
    release_dirname: Option<ReleaseName>,
    release_path: Option<String>,
    current_revision: Option<Revision>,
}

impl DeploymentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_release(&self) -> Option<&ReleaseName> {
        self.previous_release.as_ref()
    }

    pub fn previous_revision(&self) -> Option<&Revision> {
        self.previous_revision.as_ref()
    }

    pub fn release_dirname(&self) -> Option<&ReleaseName> {
        self.release_dirname.as_ref()
    }

    pub fn release_path(&self) -> Option<&str> {
        self.release_path.as_deref()
    }

    pub fn current_revision(&self) -> Option<&Revision> {
        self.current_revision.as_ref()
    }

    /// Whether the run got as far as writing the REVISION file
    pub fn is_complete(&self) -> bool {
        self.release_path.is_some() && self.current_revision.is_some()
    }

    pub(crate) fn set_previous_release(&mut self, release: Option<ReleaseName>) {
        self.previous_release = release;
        if self.previous_release.is_none() {
            self.previous_revision = None;
        }
    }

    pub(crate) fn set_previous_revision(
        &mut self,
        revision: Option<Revision>,
    ) -> Result<(), ReleaseError> {
        if revision.is_some() && self.previous_release.is_none() {
            return Err(ReleaseError::IncompleteRelease(
                "previous revision without a previous release".to_string(),
            ));
        }
        self.previous_revision = revision;
        Ok(())
    }

    pub(crate) fn set_release(
        &mut self,
        dirname: ReleaseName,
        path: String,
    ) -> Result<(), ReleaseError> {
        if self.release_dirname.is_some() {
            return Err(ReleaseError::StateAlreadySet("release_dirname"));
        }
        self.release_dirname = Some(dirname);
        self.release_path = Some(path);
        Ok(())
    }

    pub(crate) fn set_current_revision(&mut self, revision: Revision) -> Result<(), ReleaseError> {
        if self.current_revision.is_some() {
            return Err(ReleaseError::StateAlreadySet("current_revision"));
        }
        self.current_revision = Some(revision);
        Ok(())
    }
}
