//! Release names and revisions

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ReleaseError;

/// chrono format of a release directory name, `YYYY.MM.DD_HH.mm.ss`
pub const RELEASE_NAME_FORMAT: &str = "%Y.%m.%d_%H.%M.%S";

/// Marker file written at the root of every completed release
pub const REVISION_FILE: &str = "REVISION";

/// Name of a release directory under the releases root.
///
/// Names generated here are UTC timestamps at second granularity, so lexical
/// order is chronological order. Names read back from the servers are kept
/// as they are, since `current` may point at a release made by another tool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseName(String);

impl ReleaseName {
    /// Name for a release created at `at`
    pub fn at(at: DateTime<Utc>) -> Self {
        Self(at.format(RELEASE_NAME_FORMAT).to_string())
    }

    /// Validate a timestamped directory name
    pub fn parse(name: &str) -> Result<Self, ReleaseError> {
        let parsed = NaiveDateTime::parse_from_str(name, RELEASE_NAME_FORMAT)
            .map_err(|e| ReleaseError::InvalidReleaseName(format!("{}: {}", name, e)))?;

        // chrono accepts unpadded fields, the directory name must not
        if parsed.format(RELEASE_NAME_FORMAT).to_string() != name {
            return Err(ReleaseError::InvalidReleaseName(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }

    /// Name of an existing release directory, any single path segment
    pub fn existing(name: &str) -> Result<Self, ReleaseError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(ReleaseError::InvalidReleaseName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Release name from a `readlink` result such as `/srv/app/releases/2024.03.01_09.00.00`.
    ///
    /// The last segment is taken as is; it does not have to be a timestamp.
    pub fn from_path(path: &str) -> Result<Self, ReleaseError> {
        let trimmed = path.trim().trim_end_matches('/');
        let dirname = trimmed.rsplit('/').next().unwrap_or(trimmed);
        Self::existing(dirname)
    }

    /// Whether the name has the `YYYY.MM.DD_HH.mm.ss` shape of generated names
    pub fn is_timestamped(&self) -> bool {
        Self::parse(&self.0).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReleaseName {
    type Error = ReleaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::existing(&value)
    }
}

impl From<ReleaseName> for String {
    fn from(name: ReleaseName) -> Self {
        name.0
    }
}

/// A version-control commit identifier, opaque apart from being trimmed and non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Revision from raw command output; `None` when the output is blank
    pub fn from_output(output: &str) -> Option<Self> {
        let trimmed = output.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join a child under a remote POSIX directory
pub fn join_remote(base: &str, child: &str) -> String {
    if base.is_empty() {
        return child.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), child.trim_start_matches('/'))
}
