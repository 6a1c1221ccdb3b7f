//! Heuristic classification over the analysis snapshot.
//!
//! Each rule is a pure function of the snapshot: it derives a flagged
//! subset and a per-record advisory message, and nothing else. Rules run
//! strictly in sequence, depend only on counts the fetcher computed, and
//! never depend on each other. A record missing a field a rule needs is
//! excluded from that rule's flagged set, with a warning, never an error.
//!
//! Entities reviewed in a prior run keep their loaded annotations and
//! flagged entries untouched, so a resumed run's output for them is
//! byte-identical to an uninterrupted run's.

use chrono::{DateTime, FixedOffset, TimeDelta};
use tracing::warn;

use crate::config::AuditConfig;
use crate::rules::advisories;
use crate::session::ResumeState;
use crate::snapshot::model::{AnalysisSnapshot, ScanRecord};

/// Run every rule in the required order, then refresh the global counts.
/// Idempotent: a second pass over an unmodified snapshot produces the same
/// flagged sets and message text.
pub fn classify(snapshot: &mut AnalysisSnapshot, config: &AuditConfig, resume: &ResumeState) {
    calc_scan_sizes(snapshot);
    find_projects_with_too_many_versions(snapshot, config, resume);
    find_projects_without_an_owner(snapshot, resume);
    find_versions_with_too_many_scans(snapshot, config, resume);
    find_versions_with_zero_scans(snapshot, resume);
    find_unmapped_scans(snapshot);
    find_high_frequency_scans(snapshot);
    finalize_scan_counts(snapshot);
}

/// Roll scan sizes up: version size = sum of child scans, project size =
/// sum of child versions.
fn calc_scan_sizes(snapshot: &mut AnalysisSnapshot) {
    for project in &mut snapshot.projects {
        let mut project_scan_size = 0u64;
        for version in &mut project.versions {
            let version_scan_size: u64 = version.scans.iter().map(|s| s.scan_size).sum();
            version.scan_size = version_scan_size;
            project_scan_size += version_scan_size;
        }
        project.scan_size = project_scan_size;
    }
}

fn find_projects_with_too_many_versions(
    snapshot: &mut AnalysisSnapshot,
    config: &AuditConfig,
    resume: &ResumeState,
) {
    let AnalysisSnapshot {
        projects,
        projects_with_too_many_versions: flagged,
        ..
    } = snapshot;

    flagged.retain(|p| resume.project_reviewed(&p.name));
    for project in projects.iter_mut() {
        if resume.project_reviewed(&project.name) {
            continue;
        }
        if project.num_versions > config.max_versions_per_project {
            project.too_many_versions_message = Some(advisories::too_many_versions(
                &project.name,
                project.num_versions,
                config.max_versions_per_project,
            ));
            flagged.push(project.clone());
        } else {
            project.too_many_versions_message = None;
        }
    }
}

fn find_projects_without_an_owner(snapshot: &mut AnalysisSnapshot, resume: &ResumeState) {
    let AnalysisSnapshot {
        projects,
        projects_without_an_owner: flagged,
        ..
    } = snapshot;

    flagged.retain(|p| resume.project_reviewed(&p.name));
    for project in projects.iter_mut() {
        if resume.project_reviewed(&project.name) {
            continue;
        }
        if !project.has_owner() {
            project.no_owner_message = Some(advisories::no_owner(&project.name));
            flagged.push(project.clone());
        } else {
            project.no_owner_message = None;
        }
    }
}

fn find_versions_with_too_many_scans(
    snapshot: &mut AnalysisSnapshot,
    config: &AuditConfig,
    resume: &ResumeState,
) {
    let AnalysisSnapshot {
        projects,
        versions_with_too_many_scans: flagged,
        ..
    } = snapshot;

    flagged.retain(|v| resume.version_reviewed(&v.review_key()));
    for project in projects.iter_mut() {
        if resume.project_reviewed(&project.name) {
            continue;
        }
        for version in &mut project.versions {
            if resume.version_reviewed(&version.review_key()) {
                continue;
            }
            if version.num_scans > config.max_scans_per_version {
                let bom_scans_over = (version.num_bom_scans > config.max_scans_per_version)
                    .then_some(version.num_bom_scans);
                version.too_many_scans_message = Some(advisories::too_many_scans(
                    version.project_name.as_deref().unwrap_or(&project.name),
                    &version.version_name,
                    version.num_scans,
                    config.max_scans_per_version,
                    bom_scans_over,
                ));
                flagged.push(version.clone());
            } else {
                version.too_many_scans_message = None;
            }
        }
    }
}

fn find_versions_with_zero_scans(snapshot: &mut AnalysisSnapshot, resume: &ResumeState) {
    let AnalysisSnapshot {
        projects,
        versions_with_zero_scans: flagged,
        ..
    } = snapshot;

    flagged.retain(|v| resume.version_reviewed(&v.review_key()));
    for project in projects.iter_mut() {
        if resume.project_reviewed(&project.name) {
            continue;
        }
        for version in &mut project.versions {
            if resume.version_reviewed(&version.review_key()) {
                continue;
            }
            if version.num_scans == 0 {
                version.zero_scans_message = Some(advisories::zero_scans(
                    version.project_name.as_deref().unwrap_or(&project.name),
                    &version.version_name,
                ));
                flagged.push(version.clone());
            } else {
                version.zero_scans_message = None;
            }
        }
    }
}

/// Scans are refetched whole each run, so this rule always rebuilds from
/// scratch (no resume skip).
fn find_unmapped_scans(snapshot: &mut AnalysisSnapshot) {
    let AnalysisSnapshot {
        scans,
        unmapped_scans: flagged,
        ..
    } = snapshot;

    flagged.clear();
    for scan in scans.iter_mut() {
        if scan.mapped_project_version.is_none() {
            scan.unmapped_scan_message = Some(advisories::unmapped_scan(&scan.name));
            flagged.push(scan.clone());
        } else {
            scan.unmapped_scan_message = None;
        }
    }
    snapshot.total_unmapped_scans = snapshot.unmapped_scans.len();
}

fn find_high_frequency_scans(snapshot: &mut AnalysisSnapshot) {
    let AnalysisSnapshot {
        scans,
        high_frequency_scans: flagged,
        ..
    } = snapshot;

    flagged.clear();
    for scan in scans.iter_mut() {
        match high_frequency_summary_count(scan) {
            Some(count) => {
                scan.high_freq_scan_message = Some(advisories::high_frequency_scan(count));
                flagged.push(scan.clone());
            }
            None => scan.high_freq_scan_message = None,
        }
    }
}

/// Returns the number of timestamped summaries when the scan ran too
/// frequently: at least two parseable timestamps where either the full
/// oldest-to-newest span or any consecutive pair is under 24 hours.
fn high_frequency_summary_count(scan: &ScanRecord) -> Option<usize> {
    if scan.scan_summaries.len() < 2 {
        return None;
    }

    let mut timestamps: Vec<DateTime<FixedOffset>> = Vec::new();
    for summary in &scan.scan_summaries {
        // Summaries without a createdAt exist in the wild; they simply
        // don't participate in frequency detection.
        let Some(created_at) = summary.created_at.as_deref() else {
            continue;
        };
        match DateTime::parse_from_rfc3339(created_at) {
            Ok(timestamp) => timestamps.push(timestamp),
            Err(error) => {
                warn!(scan = scan.name, created_at, %error,
                    "unparseable scan summary timestamp, ignoring");
            }
        }
    }
    if timestamps.len() < 2 {
        return None;
    }
    timestamps.sort();

    let day = TimeDelta::hours(24);
    let total_span_under_24h = timestamps[timestamps.len() - 1] - timestamps[0] < day;
    let any_span_under_24h = timestamps.windows(2).any(|pair| pair[1] - pair[0] < day);

    (total_span_under_24h || any_span_under_24h).then_some(timestamps.len())
}

/// Global scan counts: totals plus the signature/BOM split.
fn finalize_scan_counts(snapshot: &mut AnalysisSnapshot) {
    snapshot.total_scans = snapshot.scans.len();
    snapshot.total_scan_size = snapshot.scans.iter().map(|s| s.scan_size).sum();
    snapshot.number_signature_scans = snapshot
        .scans
        .iter()
        .filter(|s| s.is_signature_scan())
        .count();
    snapshot.number_bom_scans = snapshot.scans.iter().filter(|s| s.is_bom_scan()).count();
}
