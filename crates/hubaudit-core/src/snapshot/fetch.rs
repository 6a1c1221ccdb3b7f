//! Inventory fetching: one complete, denormalized snapshot of the remote
//! server's projects, versions, scans, policies, and job statistics.
//!
//! The walk is sequential and fully materializing (target inventories stay
//! within ~1e5 records). Root collections are fatal on failure; per-node
//! failures are logged and treated as zero children so one broken entity
//! cannot sink a multi-hour run.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::client::{ClientError, InventoryClient};
use crate::config::AuditConfig;
use crate::project::{self, ProjectionError, project_record};
use crate::session::ResumeState;
use crate::snapshot::model::{
    AnalysisSnapshot, Policy, ProjectRecord, ScanRecord, ScanSummary, VersionRecord,
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("malformed {entity} record at {url}: {detail}")]
    Malformed {
        entity: &'static str,
        url: String,
        detail: String,
    },
}

/// Whether the walk ran to the end or was interrupted by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Complete,
    Cancelled,
}

pub struct InventoryFetcher<'a> {
    client: &'a dyn InventoryClient,
    config: &'a AuditConfig,
    cancel: CancelToken,
}

impl<'a> InventoryFetcher<'a> {
    pub fn new(client: &'a dyn InventoryClient, config: &'a AuditConfig, cancel: CancelToken) -> Self {
        Self {
            client,
            config,
            cancel,
        }
    }

    /// Fill the snapshot from the remote collaborator. On cancellation the
    /// snapshot holds everything fetched so far and is valid as a resume
    /// checkpoint.
    pub fn fetch(
        &self,
        snapshot: &mut AnalysisSnapshot,
        resume: &ResumeState,
    ) -> Result<FetchOutcome, FetchError> {
        let outcome = self.fetch_hierarchy(snapshot, resume)?;
        if outcome == FetchOutcome::Cancelled {
            recompute_totals(snapshot);
            return Ok(FetchOutcome::Cancelled);
        }

        let outcome = self.fetch_scan_collection(snapshot)?;
        if outcome == FetchOutcome::Cancelled {
            recompute_totals(snapshot);
            return Ok(FetchOutcome::Cancelled);
        }

        self.fetch_policies(snapshot)?;
        if self.config.analyze_jobs {
            self.fetch_job_statistics(snapshot)?;
        }

        recompute_totals(snapshot);
        Ok(FetchOutcome::Complete)
    }

    fn fetch_hierarchy(
        &self,
        snapshot: &mut AnalysisSnapshot,
        resume: &ResumeState,
    ) -> Result<FetchOutcome, FetchError> {
        info!("fetching projects");
        let raw_projects = self.client.list_projects(self.config.page_size)?;
        info!(count = raw_projects.len(), "fetched projects");

        let total = raw_projects.len();
        for (index, raw_project) in raw_projects.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("fetch cancelled, keeping snapshot as checkpoint");
                return Ok(FetchOutcome::Cancelled);
            }

            let Some(name) = raw_project.get("name").and_then(Value::as_str) else {
                warn!("skipping project record without a name");
                continue;
            };
            if resume.project_reviewed(name) {
                debug!(project = name, "already reviewed, skipping");
                continue;
            }

            // Root records without identity are a fatal fetch error.
            let project_url = project::self_link(raw_project)?.to_string();

            let (versions, interrupted) = self.fetch_versions(raw_project, name, resume);
            info!(
                project = name,
                position = index + 1,
                total,
                versions = versions.len(),
                "fetched project"
            );

            let projected = project_record(raw_project, &[])?;
            let mut record: ProjectRecord =
                serde_json::from_value(projected).map_err(|e| FetchError::Malformed {
                    entity: "project",
                    url: project_url,
                    detail: e.to_string(),
                })?;
            record.num_versions = versions.len();
            record.versions = versions;
            for version in &record.versions {
                snapshot.reviewed_versions.insert(version.review_key());
            }
            snapshot.projects.push(record);

            if interrupted {
                info!("fetch cancelled, keeping snapshot as checkpoint");
                return Ok(FetchOutcome::Cancelled);
            }
            snapshot.reviewed_projects.insert(name.to_string());
        }

        Ok(FetchOutcome::Complete)
    }

    /// Walk one project's versions. The bool is true when cancellation hit
    /// mid-project; the versions gathered so far still go into the
    /// checkpoint, with the project left unreviewed so resume re-walks it.
    fn fetch_versions(
        &self,
        raw_project: &Value,
        project_name: &str,
        resume: &ResumeState,
    ) -> (Vec<VersionRecord>, bool) {
        let project_url = match project::self_link(raw_project) {
            Ok(url) => url,
            Err(_) => return (vec![], false),
        };

        let raw_versions = match self.client.list_versions(project_url, self.config.page_size) {
            Ok(versions) => versions,
            Err(error) => {
                warn!(
                    project = project_name,
                    url = project_url,
                    %error,
                    "failed to fetch versions, treating as none"
                );
                return (vec![], false);
            }
        };

        let mut records = Vec::with_capacity(raw_versions.len());
        for raw_version in &raw_versions {
            if self.cancel.is_cancelled() {
                return (records, true);
            }

            let Some(version_name) = raw_version.get("versionName").and_then(Value::as_str) else {
                warn!(project = project_name, "skipping version record without a versionName");
                continue;
            };
            let key = format!("{project_name}:{version_name}");
            if resume.version_reviewed(&key) {
                if let Some(carried) = resume.carried_version(&key) {
                    records.push(carried.clone());
                }
                debug!(version = key, "already reviewed, skipping");
                continue;
            }

            match self.build_version(raw_version, project_name) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(
                        project = project_name,
                        version = version_name,
                        %error,
                        "skipping malformed version record"
                    );
                    continue;
                }
            }
        }

        (records, false)
    }

    fn build_version(
        &self,
        raw_version: &Value,
        project_name: &str,
    ) -> Result<VersionRecord, FetchError> {
        let version_url = project::self_link(raw_version)?.to_string();
        let version_name = project::record_name(raw_version).to_string();

        let scans = match self
            .client
            .list_scans_for_version(&version_url, self.config.page_size)
        {
            Ok(raw_scans) => {
                debug!(
                    project = project_name,
                    version = version_name,
                    codelocations = raw_scans.len(),
                    "fetched version scans"
                );
                self.build_mapped_scans(&raw_scans, project_name, &version_name)
            }
            Err(error) => {
                warn!(
                    project = project_name,
                    version = version_name,
                    url = version_url,
                    %error,
                    "failed to fetch scans, treating as none"
                );
                vec![]
            }
        };

        let projected = project_record(raw_version, &[("project_name", project_name)])?;
        let mut record: VersionRecord =
            serde_json::from_value(projected).map_err(|e| FetchError::Malformed {
                entity: "version",
                url: version_url,
                detail: e.to_string(),
            })?;
        record.num_scans = scans.len();
        record.num_bom_scans = scans.iter().filter(|s| s.is_bom_scan()).count();
        record.scans = scans;
        Ok(record)
    }

    fn build_mapped_scans(
        &self,
        raw_scans: &[Value],
        project_name: &str,
        version_name: &str,
    ) -> Vec<ScanRecord> {
        let mut records = Vec::with_capacity(raw_scans.len());
        for raw_scan in raw_scans {
            let context = [
                ("project_name", project_name),
                ("version_name", version_name),
            ];
            let record = project_record(raw_scan, &context)
                .map_err(FetchError::from)
                .and_then(|projected| {
                    serde_json::from_value::<ScanRecord>(projected).map_err(|e| {
                        FetchError::Malformed {
                            entity: "scan",
                            url: project::record_name(raw_scan).to_string(),
                            detail: e.to_string(),
                        }
                    })
                });
            match record {
                Ok(scan) => records.push(scan),
                Err(error) => {
                    warn!(project = project_name, version = version_name, %error,
                        "skipping malformed scan record");
                }
            }
        }
        records
    }

    /// The flat, global code-location collection, each entry with its full
    /// scan-summary history. Assigned only once complete, so an interrupted
    /// pass is refetched next run rather than mistaken for complete.
    fn fetch_scan_collection(
        &self,
        snapshot: &mut AnalysisSnapshot,
    ) -> Result<FetchOutcome, FetchError> {
        if !snapshot.scans.is_empty() {
            debug!("scan collection restored from prior artifact");
            return Ok(FetchOutcome::Complete);
        }

        info!("fetching codelocations");
        let raw_scans = self.client.list_all_scans(self.config.page_size)?;
        info!(count = raw_scans.len(), "fetched codelocations");

        let total = raw_scans.len();
        let mut records = Vec::with_capacity(total);
        for (index, raw_scan) in raw_scans.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("fetch cancelled during codelocation pass, discarding partial pass");
                return Ok(FetchOutcome::Cancelled);
            }

            let scan_url = project::self_link(raw_scan)?.to_string();
            let name = project::record_name(raw_scan);

            let summaries = match self
                .client
                .list_scan_summaries(&scan_url, self.config.page_size)
            {
                Ok(raw_summaries) => self.build_summaries(&raw_summaries, name),
                Err(error) => {
                    warn!(scan = name, url = scan_url, %error,
                        "failed to fetch scan summaries, treating as none");
                    vec![]
                }
            };
            info!(
                scan = name,
                position = index + 1,
                total,
                summaries = summaries.len(),
                "fetched codelocation"
            );

            let projected = project_record(raw_scan, &[])?;
            let mut record: ScanRecord =
                serde_json::from_value(projected).map_err(|e| FetchError::Malformed {
                    entity: "scan",
                    url: scan_url,
                    detail: e.to_string(),
                })?;
            record.scan_summaries = summaries;
            records.push(record);
        }

        snapshot.scans = records;
        Ok(FetchOutcome::Complete)
    }

    fn build_summaries(&self, raw_summaries: &[Value], scan_name: &str) -> Vec<ScanSummary> {
        let mut records = Vec::with_capacity(raw_summaries.len());
        for raw_summary in raw_summaries {
            let record = project_record(raw_summary, &[])
                .map_err(FetchError::from)
                .and_then(|projected| {
                    serde_json::from_value::<ScanSummary>(projected).map_err(|e| {
                        FetchError::Malformed {
                            entity: "scan summary",
                            url: scan_name.to_string(),
                            detail: e.to_string(),
                        }
                    })
                });
            match record {
                Ok(summary) => records.push(summary),
                Err(error) => {
                    warn!(scan = scan_name, %error, "skipping malformed scan summary");
                }
            }
        }
        records
    }

    fn fetch_policies(&self, snapshot: &mut AnalysisSnapshot) -> Result<(), FetchError> {
        if !snapshot.policies.is_empty() {
            debug!("policies restored from prior artifact");
            return Ok(());
        }

        info!("fetching policies");
        let raw_policies = self.client.list_policies(self.config.page_size)?;
        info!(count = raw_policies.len(), "fetched policies");

        let mut records = Vec::with_capacity(raw_policies.len());
        for raw_policy in &raw_policies {
            let projected = project_record(raw_policy, &[])?;
            let record: Policy =
                serde_json::from_value(projected).map_err(|e| FetchError::Malformed {
                    entity: "policy",
                    url: project::record_name(raw_policy).to_string(),
                    detail: e.to_string(),
                })?;
            records.push(record);
        }
        snapshot.policies = records;
        Ok(())
    }

    fn fetch_job_statistics(&self, snapshot: &mut AnalysisSnapshot) -> Result<(), FetchError> {
        if snapshot.job_statistics.is_some() {
            debug!("job statistics restored from prior artifact");
            return Ok(());
        }

        info!("fetching job statistics");
        let statistics = self.client.list_job_statistics(self.config.page_size)?;
        info!(count = statistics.len(), "fetched job statistics");
        snapshot.job_statistics = Some(statistics);
        Ok(())
    }
}

/// Roll the headline counts up from the collections. Safe to call on a
/// partial (checkpoint) snapshot.
pub fn recompute_totals(snapshot: &mut AnalysisSnapshot) {
    snapshot.total_projects = snapshot.projects.len();
    snapshot.total_versions = snapshot.projects.iter().map(|p| p.num_versions).sum();
    snapshot.total_scans = snapshot.scans.len();
}
