//! Boundary to the remote inventory server.
//!
//! The engine depends only on [`InventoryClient`]: paginated read access to
//! the inventory collections plus the deletion operations used by cleanup
//! tooling. Transport, authentication, and retry live behind this trait in
//! the [`http`] adapter; nothing in the engine sees them.

pub mod http;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("network error talking to {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid response body from {url}: {detail}")]
    Decode { url: String, detail: String },

    #[error("authentication rejected by {url}")]
    Unauthorized { url: String },
}

/// Result of a deletion request.
///
/// Deletes report an outcome instead of treating "not found" as an error;
/// on a delete-if-exists path the caller decides that `NotFound` is
/// success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Worth retrying later (rate limiting, gateway trouble).
    TransientFailure(String),
    PermanentFailure(String),
}

/// Narrow capability set the engine requires from the remote server.
///
/// Every listing drains server-side pagination internally and returns raw
/// JSON records, each carrying a `_meta.href` self-link. Listings are
/// sequential and ordered as the server returns them, which keeps re-runs
/// deterministic.
pub trait InventoryClient {
    /// Base URL of the server, recorded in the report as `hub_url`.
    fn base_url(&self) -> &str;

    /// Server release string, recorded in the report as `hub_version`.
    fn current_version(&self) -> Result<String, ClientError>;

    fn list_projects(&self, page_size: usize) -> Result<Vec<Value>, ClientError>;

    fn list_versions(&self, project_url: &str, page_size: usize)
    -> Result<Vec<Value>, ClientError>;

    fn list_scans_for_version(
        &self,
        version_url: &str,
        page_size: usize,
    ) -> Result<Vec<Value>, ClientError>;

    /// The global code-location collection, including unmapped scans.
    fn list_all_scans(&self, page_size: usize) -> Result<Vec<Value>, ClientError>;

    fn list_scan_summaries(&self, scan_url: &str, page_size: usize)
    -> Result<Vec<Value>, ClientError>;

    fn list_policies(&self, page_size: usize) -> Result<Vec<Value>, ClientError>;

    fn list_job_statistics(&self, page_size: usize) -> Result<Vec<Value>, ClientError>;

    fn delete_project(&self, project_url: &str) -> Result<DeleteOutcome, ClientError>;

    fn delete_version(&self, version_url: &str) -> Result<DeleteOutcome, ClientError>;

    fn delete_scan(&self, scan_url: &str) -> Result<DeleteOutcome, ClientError>;
}
