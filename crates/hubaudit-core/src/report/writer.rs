//! Durable report output.
//!
//! Writability is verified once at construction, before any network call,
//! so a multi-hour analysis never fails at the very end on a permission
//! problem. The final document is written to a temp file in the
//! destination directory and renamed into place, so readers observe either
//! the previous complete report or the new one, never a partial write.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::snapshot::model::AnalysisSnapshot;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("need write access to {path} in order to save the analysis results")]
    Permission {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report to {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Verify the destination up front: an existing file must be writable,
    /// a missing one must be creatable (the probe leaves an empty file, so
    /// a later resume of an aborted first run has something to point at).
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, WriterError> {
        let path = path.into();

        let probe = if path.exists() {
            std::fs::OpenOptions::new().append(true).open(&path)
        } else {
            std::fs::File::create(&path)
        };
        probe.map_err(|source| WriterError::Permission {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the snapshot and atomically replace the destination.
    pub fn write(&self, snapshot: &AnalysisSnapshot) -> Result<(), WriterError> {
        let io_error = |source| WriterError::Io {
            path: self.path.display().to_string(),
            source,
        };

        let body = serde_json::to_vec(snapshot)?;

        let directory = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::NamedTempFile::new_in(directory).map_err(io_error)?;
        temp.write_all(&body).map_err(io_error)?;
        temp.flush().map_err(io_error)?;
        temp.persist(&self.path).map_err(|e| io_error(e.error))?;

        info!(path = %self.path.display(), bytes = body.len(), "wrote analysis results");
        Ok(())
    }
}
