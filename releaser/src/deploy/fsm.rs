//! Finite State Machine for one release run

use serde::{Deserialize, Serialize};

use crate::errors::ReleaseError;

/// Release stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    /// Nothing done yet
    Start,

    /// Previous release looked up (possibly absent)
    PreviousReleaseKnown,

    /// Previous revision looked up (possibly absent)
    PreviousRevisionKnown,

    /// Release directory exists on every server
    PathCreated,

    /// Empty repository initialized in the release directory
    RepoInitialized,

    /// Source repository registered as a remote
    RemoteAdded,

    /// Branch fetched
    Fetched,

    /// Branch checked out into the working tree
    CheckedOut,

    /// REVISION file written
    RevisionRecorded,

    /// Run finished, completion signalled
    Completed,

    /// A remote command failed
    Failed,
}

impl ReleaseStage {
    /// Stage reached by advancing from this one
    fn next(self) -> Option<ReleaseStage> {
        use ReleaseStage::*;
        match self {
            Start => Some(PreviousReleaseKnown),
            PreviousReleaseKnown => Some(PreviousRevisionKnown),
            PreviousRevisionKnown => Some(PathCreated),
            PathCreated => Some(RepoInitialized),
            RepoInitialized => Some(RemoteAdded),
            RemoteAdded => Some(Fetched),
            Fetched => Some(CheckedOut),
            CheckedOut => Some(RevisionRecorded),
            RevisionRecorded => Some(Completed),
            Completed | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ReleaseStage::Completed | ReleaseStage::Failed)
    }
}

/// Release event
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// Current step succeeded
    Advance,

    /// Current step failed
    Fail(String),
}

/// Release FSM
#[derive(Debug, Clone)]
pub struct ReleaseFsm {
    stage: ReleaseStage,
    error: Option<String>,
    failed_at: Option<ReleaseStage>,
}

impl ReleaseFsm {
    /// Create a new FSM at the start stage
    pub fn new() -> Self {
        Self {
            stage: ReleaseStage::Start,
            error: None,
            failed_at: None,
        }
    }

    /// Get current stage
    pub fn stage(&self) -> ReleaseStage {
        self.stage
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Last stage reached before failing
    pub fn failed_at(&self) -> Option<ReleaseStage> {
        self.failed_at
    }

    /// Process an event and transition stage
    pub fn process(&mut self, event: ReleaseEvent) -> Result<ReleaseStage, ReleaseError> {
        let new_stage = match (self.stage.next(), event) {
            (Some(next), ReleaseEvent::Advance) => next,
            (Some(_), ReleaseEvent::Fail(err)) => {
                self.error = Some(err);
                self.failed_at = Some(self.stage);
                ReleaseStage::Failed
            }
            (None, event) => {
                return Err(ReleaseError::InvalidTransition(format!(
                    "{:?} -> {:?}",
                    self.stage, event
                )));
            }
        };

        self.stage = new_stage;
        Ok(new_stage)
    }
}

impl Default for ReleaseFsm {
    fn default() -> Self {
        Self::new()
    }
}
