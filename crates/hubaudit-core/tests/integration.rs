//! End-to-end tests over an in-memory inventory: fetch, classify, resume,
//! and the failure policies at each level.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use hubaudit_core::audit::{AuditOutcome, Auditor};
use hubaudit_core::cancel::CancelToken;
use hubaudit_core::client::{ClientError, DeleteOutcome, InventoryClient};
use hubaudit_core::config::AuditConfig;
use hubaudit_core::report::writer::ReportWriter;
use hubaudit_core::rules::classify::classify;
use hubaudit_core::session::{self, ResumeState, RunMode};
use hubaudit_core::snapshot::fetch::{FetchOutcome, InventoryFetcher};
use hubaudit_core::snapshot::model::AnalysisSnapshot;

fn project_url(name: &str) -> String {
    format!("https://hub/api/projects/{name}")
}

fn version_url(project: &str, version: &str) -> String {
    format!("https://hub/api/projects/{project}/versions/{version}")
}

fn raw_project(name: &str) -> Value {
    json!({
        "name": name,
        "projectOwner": format!("https://hub/api/users/{name}-owner"),
        "_meta": {"href": project_url(name)}
    })
}

fn raw_version(project: &str, name: &str) -> Value {
    json!({
        "versionName": name,
        "phase": "DEVELOPMENT",
        "createdAt": "2025-01-01T00:00:00Z",
        "_meta": {"href": version_url(project, name)}
    })
}

fn raw_scan(name: &str, mapped: bool) -> Value {
    let mut scan = json!({
        "name": name,
        "scanSize": 1000,
        "createdAt": "2025-01-01T00:00:00Z",
        "_meta": {"href": format!("https://hub/api/codelocations/{name}")}
    });
    if mapped {
        scan["mappedProjectVersion"] = json!("https://hub/api/versions/some");
    }
    scan
}

#[derive(Default)]
struct FakeInventory {
    projects: Vec<Value>,
    versions: HashMap<String, Vec<Value>>,
    scans_by_version: HashMap<String, Vec<Value>>,
    all_scans: Vec<Value>,
    summaries: HashMap<String, Vec<Value>>,
    policies: Vec<Value>,
    job_statistics: Vec<Value>,
    fail_project_list: bool,
    fail_versions_for: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeInventory {
    fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl InventoryClient for FakeInventory {
    fn base_url(&self) -> &str {
        "https://hub"
    }

    fn current_version(&self) -> Result<String, ClientError> {
        Ok("2025.4.0".to_string())
    }

    fn list_projects(&self, _page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.record("projects".to_string());
        if self.fail_project_list {
            return Err(ClientError::Status {
                status: 500,
                url: "https://hub/api/projects".to_string(),
            });
        }
        Ok(self.projects.clone())
    }

    fn list_versions(
        &self,
        project_url: &str,
        _page_size: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.record(format!("versions:{project_url}"));
        if self.fail_versions_for.contains(project_url) {
            return Err(ClientError::Status {
                status: 503,
                url: project_url.to_string(),
            });
        }
        Ok(self.versions.get(project_url).cloned().unwrap_or_default())
    }

    fn list_scans_for_version(
        &self,
        version_url: &str,
        _page_size: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.record(format!("scans:{version_url}"));
        Ok(self
            .scans_by_version
            .get(version_url)
            .cloned()
            .unwrap_or_default())
    }

    fn list_all_scans(&self, _page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.record("all_scans".to_string());
        Ok(self.all_scans.clone())
    }

    fn list_scan_summaries(
        &self,
        scan_url: &str,
        _page_size: usize,
    ) -> Result<Vec<Value>, ClientError> {
        self.record(format!("summaries:{scan_url}"));
        Ok(self.summaries.get(scan_url).cloned().unwrap_or_default())
    }

    fn list_policies(&self, _page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.record("policies".to_string());
        Ok(self.policies.clone())
    }

    fn list_job_statistics(&self, _page_size: usize) -> Result<Vec<Value>, ClientError> {
        self.record("job_statistics".to_string());
        Ok(self.job_statistics.clone())
    }

    fn delete_project(&self, project_url: &str) -> Result<DeleteOutcome, ClientError> {
        self.record(format!("delete:{project_url}"));
        if self.projects.iter().any(|p| {
            p.pointer("/_meta/href").and_then(Value::as_str) == Some(project_url)
        }) {
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }

    fn delete_version(&self, version_url: &str) -> Result<DeleteOutcome, ClientError> {
        self.record(format!("delete:{version_url}"));
        Ok(DeleteOutcome::NotFound)
    }

    fn delete_scan(&self, scan_url: &str) -> Result<DeleteOutcome, ClientError> {
        self.record(format!("delete:{scan_url}"));
        Ok(DeleteOutcome::NotFound)
    }
}

/// Ten projects with ten versions each, three mapped scans per version,
/// plus a global scan collection with one unmapped entry.
fn populated_inventory() -> FakeInventory {
    let mut fake = FakeInventory::default();
    for p in 0..10 {
        let project_name = format!("project{p}");
        fake.projects.push(raw_project(&project_name));
        let mut versions = Vec::new();
        for v in 0..10 {
            let version_name = format!("{v}.0");
            versions.push(raw_version(&project_name, &version_name));
            fake.scans_by_version.insert(
                version_url(&project_name, &version_name),
                vec![
                    raw_scan(&format!("{project_name}-{version_name} scan"), true),
                    raw_scan(&format!("{project_name}-{version_name} bom"), true),
                    raw_scan(&format!("{project_name}-{version_name} extra scan"), true),
                ],
            );
        }
        fake.versions.insert(project_url(&project_name), versions);
    }

    fake.all_scans = vec![
        raw_scan("global scan", true),
        raw_scan("global bom", true),
        raw_scan("loose scan", false),
    ];
    fake.summaries.insert(
        "https://hub/api/codelocations/global scan".to_string(),
        vec![
            json!({"createdAt": "2025-03-01T00:00:00Z", "status": "COMPLETE",
                   "_meta": {"href": "https://hub/api/scan-summaries/1"}}),
            json!({"createdAt": "2025-03-01T04:00:00Z", "status": "COMPLETE",
                   "_meta": {"href": "https://hub/api/scan-summaries/2"}}),
        ],
    );
    fake.policies = vec![json!({
        "name": "no-gpl",
        "enabled": true,
        "_meta": {"href": "https://hub/api/policy-rules/1"}
    })];
    fake.job_statistics = vec![json!({"jobType": "ScanJob", "totalFailures": 2})];
    fake
}

fn fetch_all(fake: &FakeInventory, config: &AuditConfig) -> AnalysisSnapshot {
    let mut snapshot = AnalysisSnapshot::default();
    let fetcher = InventoryFetcher::new(fake, config, CancelToken::new());
    let outcome = fetcher
        .fetch(&mut snapshot, &ResumeState::empty())
        .expect("fetch should succeed");
    assert_eq!(outcome, FetchOutcome::Complete);
    snapshot
}

#[test]
fn fetch_materializes_the_full_hierarchy() {
    let fake = populated_inventory();
    let config = AuditConfig::default();
    let snapshot = fetch_all(&fake, &config);

    assert_eq!(snapshot.total_projects, 10);
    assert_eq!(snapshot.total_versions, 100);
    assert_eq!(snapshot.total_scans, 3);

    for project in &snapshot.projects {
        assert_eq!(project.num_versions, project.versions.len());
        for version in &project.versions {
            assert_eq!(version.num_scans, version.scans.len());
            assert_eq!(
                version.num_bom_scans,
                version.scans.iter().filter(|s| s.is_bom_scan()).count()
            );
            assert_eq!(version.project_name.as_deref(), Some(project.name.as_str()));
        }
    }

    assert_eq!(fake.calls_matching("versions:"), 10);
    assert_eq!(fake.calls_matching("scans:"), 100);
    assert_eq!(fake.calls_matching("summaries:"), 3);
}

#[test]
fn fetch_attaches_summaries_and_policies() {
    let fake = populated_inventory();
    let config = AuditConfig {
        analyze_jobs: true,
        ..AuditConfig::default()
    };
    let snapshot = fetch_all(&fake, &config);

    let global = snapshot
        .scans
        .iter()
        .find(|s| s.name == "global scan")
        .unwrap();
    assert_eq!(global.scan_summaries.len(), 2);

    assert_eq!(snapshot.policies.len(), 1);
    assert_eq!(snapshot.policies[0].name, "no-gpl");
    assert!(snapshot.policies[0].enabled);

    let jobs = snapshot.job_statistics.as_ref().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["jobType"], "ScanJob");
}

#[test]
fn job_statistics_are_skipped_unless_requested() {
    let fake = populated_inventory();
    let snapshot = fetch_all(&fake, &AuditConfig::default());

    assert!(snapshot.job_statistics.is_none());
    assert_eq!(fake.calls_matching("job_statistics"), 0);
}

#[test]
fn root_project_failure_aborts_the_run() {
    let mut fake = populated_inventory();
    fake.fail_project_list = true;
    let config = AuditConfig::default();

    let mut snapshot = AnalysisSnapshot::default();
    let fetcher = InventoryFetcher::new(&fake, &config, CancelToken::new());
    let result = fetcher.fetch(&mut snapshot, &ResumeState::empty());

    assert!(result.is_err());
}

#[test]
fn one_failing_project_means_zero_versions_not_failure() {
    let mut fake = populated_inventory();
    fake.fail_versions_for.insert(project_url("project3"));
    let config = AuditConfig::default();

    let snapshot = fetch_all(&fake, &config);

    let broken = snapshot.projects.iter().find(|p| p.name == "project3").unwrap();
    assert_eq!(broken.num_versions, 0);
    assert!(broken.versions.is_empty());
    // Every other project is unaffected.
    assert_eq!(snapshot.total_versions, 90);
}

#[test]
fn classified_report_contains_all_contract_keys() {
    let fake = populated_inventory();
    let config = AuditConfig {
        analyze_jobs: true,
        ..AuditConfig::default()
    };
    let mut snapshot = fetch_all(&fake, &config);
    snapshot.hub_url = fake.base_url().to_string();
    snapshot.hub_version = fake.current_version().unwrap();
    classify(&mut snapshot, &config, &ResumeState::empty());

    let report = serde_json::to_value(&snapshot).unwrap();
    for key in [
        "tool_version",
        "time_of_analysis",
        "hub_url",
        "hub_version",
        "total_projects",
        "total_versions",
        "total_scans",
        "total_scan_size",
        "number_signature_scans",
        "number_bom_scans",
        "projects",
        "scans",
        "policies",
        "job_statistics",
        "projects_with_too_many_versions",
        "projects_without_an_owner",
        "versions_with_too_many_scans",
        "versions_with_zero_scans",
        "unmapped_scans",
        "total_unmapped_scans",
        "high_frequency_scans",
        "reviewed_projects",
        "reviewed_versions",
    ] {
        assert!(report.get(key).is_some(), "missing report key: {key}");
    }

    assert_eq!(report["total_unmapped_scans"], 1);
    assert_eq!(report["unmapped_scans"].as_array().unwrap().len(), 1);
    assert_eq!(
        report["high_frequency_scans"].as_array().unwrap().len(),
        1
    );
}

#[test]
fn resume_skips_reviewed_projects_without_client_calls() {
    let fake = populated_inventory();
    let config = AuditConfig::default();

    // First run, complete.
    let mut snapshot = fetch_all(&fake, &config);
    classify(&mut snapshot, &config, &ResumeState::empty());

    let artifact = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        artifact.path(),
        serde_json::to_string(&snapshot).unwrap(),
    )
    .unwrap();

    // Second run resumes from the artifact against a fresh fake.
    let fake2 = populated_inventory();
    let (mut resumed, resume) = session::start(RunMode::Resume, artifact.path()).unwrap();
    let fetcher = InventoryFetcher::new(&fake2, &config, CancelToken::new());
    let outcome = fetcher.fetch(&mut resumed, &resume).unwrap();
    assert_eq!(outcome, FetchOutcome::Complete);
    classify(&mut resumed, &config, &resume);

    // Everything was reviewed, so no version or scan walks happened.
    assert_eq!(fake2.calls_matching("versions:"), 0);
    assert_eq!(fake2.calls_matching("scans:"), 0);
    // The global scan collection was restored, not refetched.
    assert_eq!(fake2.calls_matching("all_scans"), 0);

    // Reviewed entries are byte-for-byte what the first run produced.
    let first = serde_json::to_value(&snapshot).unwrap();
    let second = serde_json::to_value(&resumed).unwrap();
    assert_eq!(first["projects"], second["projects"]);
    assert_eq!(
        first["projects_without_an_owner"],
        second["projects_without_an_owner"]
    );
    assert_eq!(first["scans"], second["scans"]);
}

#[test]
fn resume_fetches_only_what_is_missing() {
    let config = AuditConfig::default();

    // First run sees only the first three projects.
    let mut small = populated_inventory();
    small.projects.truncate(3);
    let mut snapshot = fetch_all(&small, &config);
    classify(&mut snapshot, &config, &ResumeState::empty());

    let artifact = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(artifact.path(), serde_json::to_string(&snapshot).unwrap()).unwrap();

    // Second run sees all ten.
    let full = populated_inventory();
    let (mut resumed, resume) = session::start(RunMode::Resume, artifact.path()).unwrap();
    let fetcher = InventoryFetcher::new(&full, &config, CancelToken::new());
    fetcher.fetch(&mut resumed, &resume).unwrap();
    classify(&mut resumed, &config, &resume);

    assert_eq!(resumed.total_projects, 10);
    assert_eq!(resumed.total_versions, 100);
    // Only the seven new projects were walked.
    assert_eq!(full.calls_matching("versions:"), 7);
    assert_eq!(full.calls_matching("scans:"), 70);
}

#[test]
fn cancellation_before_fetch_yields_an_empty_checkpoint() {
    let fake = populated_inventory();
    let config = AuditConfig::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut snapshot = AnalysisSnapshot::default();
    let fetcher = InventoryFetcher::new(&fake, &config, cancel);
    let outcome = fetcher.fetch(&mut snapshot, &ResumeState::empty()).unwrap();

    assert_eq!(outcome, FetchOutcome::Cancelled);
    assert!(snapshot.projects.is_empty());
    assert!(snapshot.reviewed_projects.is_empty());
    // The project listing itself completed; nothing deeper was walked.
    assert_eq!(fake.calls_matching("versions:"), 0);
}

#[test]
fn reviewed_sets_track_completed_entities() {
    let fake = populated_inventory();
    let snapshot = fetch_all(&fake, &AuditConfig::default());

    assert_eq!(snapshot.reviewed_projects.len(), 10);
    assert_eq!(snapshot.reviewed_versions.len(), 100);
    assert!(snapshot.reviewed_projects.contains("project0"));
    assert!(snapshot.reviewed_versions.contains("project0:0.0"));
}

#[test]
fn auditor_writes_a_complete_report() {
    let fake = populated_inventory();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let writer = ReportWriter::create(&path).unwrap();

    let outcome = Auditor::new(&fake, AuditConfig::default(), writer, CancelToken::new())
        .run()
        .unwrap();
    assert_eq!(outcome, AuditOutcome::Complete);

    let report: AnalysisSnapshot =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report.hub_url, "https://hub");
    assert_eq!(report.hub_version, "2025.4.0");
    assert_eq!(report.total_projects, 10);
    assert_eq!(report.reviewed_projects.len(), 10);
    assert!(!report.tool_version.is_empty());
    assert!(!report.time_of_analysis.is_empty());
}

#[test]
fn interrupted_auditor_leaves_a_loadable_checkpoint() {
    let fake = populated_inventory();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let writer = ReportWriter::create(&path).unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let outcome = Auditor::new(&fake, AuditConfig::default(), writer, cancel)
        .run()
        .unwrap();
    assert_eq!(outcome, AuditOutcome::Interrupted);

    // The checkpoint is a valid resume artifact.
    let (resumed, resume) = session::start(RunMode::Resume, &path).unwrap();
    assert!(resumed.projects.is_empty());
    assert!(resume.reviewed_projects.is_empty());
    assert_eq!(resumed.hub_version, "2025.4.0");
}

#[test]
fn delete_if_exists_treats_not_found_as_success() {
    let fake = populated_inventory();

    let existing = fake.delete_project(&project_url("project0")).unwrap();
    assert_eq!(existing, DeleteOutcome::Deleted);

    // Deleting something already gone is success on this path.
    let gone = fake.delete_project(&project_url("no-such-project")).unwrap();
    assert!(matches!(gone, DeleteOutcome::Deleted | DeleteOutcome::NotFound));
}
