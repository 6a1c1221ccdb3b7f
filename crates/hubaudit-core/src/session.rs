//! Session control: new runs, resumed runs, and the bookkeeping that makes
//! a long analysis resumable after interruption.
//!
//! Resume is an idempotence mechanism, not a caching optimization: a
//! resumed run's report for previously-reviewed entities must be identical
//! to what an uninterrupted run would have produced for them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::snapshot::model::{AnalysisSnapshot, VersionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Start from an empty snapshot; any existing artifact is overwritten.
    New,
    /// Load the prior artifact and skip everything already reviewed.
    Resume,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot resume: failed to read prior artifact {path}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resume: prior artifact {path} is not a valid report")]
    Invalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// An aborted first run leaves an empty destination file behind, which
    /// is not a report to resume from.
    #[error("cannot resume: prior artifact {path} is empty, no completed or interrupted run to continue")]
    Empty { path: String },
}

/// What the loaded artifact tells us to skip.
///
/// Captured once at session start and never mutated afterwards; the
/// fetcher and classifier consult it, while the growing snapshot tracks
/// this run's own progress separately.
#[derive(Debug, Default)]
pub struct ResumeState {
    pub reviewed_projects: BTreeSet<String>,
    pub reviewed_versions: BTreeSet<String>,

    /// Versions of partially-fetched projects, keyed `"{project}:{version}"`.
    /// A project interrupted mid-walk is not reviewed, so it is re-walked on
    /// resume; its already-reviewed versions are reused from here instead of
    /// re-fetching their scans.
    carried_versions: BTreeMap<String, VersionRecord>,
}

impl ResumeState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn project_reviewed(&self, name: &str) -> bool {
        self.reviewed_projects.contains(name)
    }

    pub fn version_reviewed(&self, key: &str) -> bool {
        self.reviewed_versions.contains(key)
    }

    pub fn carried_version(&self, key: &str) -> Option<&VersionRecord> {
        self.carried_versions.get(key)
    }
}

/// Begin a session: an empty snapshot for `New`, or the prior artifact
/// plus its resume state for `Resume`.
pub fn start(mode: RunMode, artifact_path: &Path) -> Result<(AnalysisSnapshot, ResumeState), SessionError> {
    match mode {
        RunMode::New => Ok((AnalysisSnapshot::default(), ResumeState::empty())),
        RunMode::Resume => {
            let text = std::fs::read_to_string(artifact_path).map_err(|source| {
                SessionError::Unreadable {
                    path: artifact_path.display().to_string(),
                    source,
                }
            })?;
            if text.trim().is_empty() {
                return Err(SessionError::Empty {
                    path: artifact_path.display().to_string(),
                });
            }
            let snapshot: AnalysisSnapshot =
                serde_json::from_str(&text).map_err(|source| SessionError::Invalid {
                    path: artifact_path.display().to_string(),
                    source,
                })?;
            let (snapshot, resume) = split_loaded(snapshot);
            info!(
                reviewed_projects = resume.reviewed_projects.len(),
                reviewed_versions = resume.reviewed_versions.len(),
                "resuming from prior artifact"
            );
            Ok((snapshot, resume))
        }
    }
}

/// Separate a loaded artifact into the snapshot to build on and the state
/// describing what it already covers.
///
/// Projects that were interrupted mid-walk (present but not reviewed) are
/// pulled out of the snapshot so the fetcher can rebuild them; their
/// completed versions are kept aside for reuse.
fn split_loaded(mut snapshot: AnalysisSnapshot) -> (AnalysisSnapshot, ResumeState) {
    let mut resume = ResumeState {
        reviewed_projects: snapshot.reviewed_projects.clone(),
        reviewed_versions: snapshot.reviewed_versions.clone(),
        carried_versions: BTreeMap::new(),
    };

    let mut kept = Vec::with_capacity(snapshot.projects.len());
    for project in snapshot.projects.drain(..) {
        if resume.reviewed_projects.contains(&project.name) {
            kept.push(project);
        } else {
            for version in project.versions {
                resume
                    .carried_versions
                    .insert(version.review_key(), version);
            }
        }
    }
    snapshot.projects = kept;

    (snapshot, resume)
}
