//! The analysis data set and report schema.
//!
//! [`AnalysisSnapshot`] is both: the in-memory aggregate the fetcher fills
//! and the classifier annotates, and the exact JSON document the report
//! writer persists. Loading a prior artifact in resume mode deserializes
//! straight back into it, so every field tolerates absence.
//!
//! Entity records are typed on the fields the engine computes or inspects;
//! everything else that survived attribute projection rides in a flattened
//! map, so heterogeneous server records round-trip through the report
//! without a field-per-field schema.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle phase of a project version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Development,
    Planning,
    Prerelease,
    Released,
    Deprecated,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub versions: Vec<VersionRecord>,

    /// Equals `versions.len()` at fetch time; rules read, never recompute.
    #[serde(default)]
    pub num_versions: usize,

    /// Sum of child version scan sizes, in bytes.
    #[serde(rename = "scanSize", default)]
    pub scan_size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub too_many_versions_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_owner_message: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ProjectRecord {
    pub fn has_owner(&self) -> bool {
        self.attributes.contains_key("projectOwner")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionRecord {
    #[serde(rename = "versionName")]
    pub version_name: String,
    pub url: String,

    /// Back-reference to the owning project, attached during projection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default)]
    pub scans: Vec<ScanRecord>,

    #[serde(default)]
    pub num_scans: usize,

    #[serde(default)]
    pub num_bom_scans: usize,

    /// Sum of child scan sizes, in bytes.
    #[serde(rename = "scanSize", default)]
    pub scan_size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub too_many_scans_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_scans_message: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl VersionRecord {
    /// Identifier used by the resume controller: `"{project}:{version}"`.
    pub fn review_key(&self) -> String {
        format!(
            "{}:{}",
            self.project_name.as_deref().unwrap_or(""),
            self.version_name
        )
    }
}

/// A code location, mapped to a project version or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRecord {
    pub name: String,
    pub url: String,

    #[serde(rename = "scanSize", default)]
    pub scan_size: u64,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// Absent iff the scan is unmapped.
    #[serde(
        rename = "mappedProjectVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mapped_project_version: Option<String>,

    #[serde(default)]
    pub scan_summaries: Vec<ScanSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmapped_scan_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_freq_scan_message: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ScanRecord {
    /// Full source-signature analysis, by naming convention.
    pub fn is_signature_scan(&self) -> bool {
        self.name.to_lowercase().ends_with("scan")
    }

    /// Bill-of-materials import, by naming convention.
    pub fn is_bom_scan(&self) -> bool {
        let name = self.name.to_lowercase();
        name.ends_with("bom") || name.ends_with("black duck i/o export")
    }
}

/// One historical execution record of a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSummary {
    pub url: String,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Root aggregate: everything fetched, derived, and flagged in one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSnapshot {
    #[serde(default)]
    pub tool_version: String,

    #[serde(default)]
    pub time_of_analysis: String,

    #[serde(default)]
    pub hub_url: String,

    #[serde(default)]
    pub hub_version: String,

    #[serde(default)]
    pub total_projects: usize,

    #[serde(default)]
    pub total_versions: usize,

    #[serde(default)]
    pub total_scans: usize,

    #[serde(default)]
    pub total_scan_size: u64,

    #[serde(default)]
    pub number_signature_scans: usize,

    #[serde(default)]
    pub number_bom_scans: usize,

    #[serde(default)]
    pub projects: Vec<ProjectRecord>,

    /// Flat global scan list, including unmapped scans.
    #[serde(default)]
    pub scans: Vec<ScanRecord>,

    #[serde(default)]
    pub policies: Vec<Policy>,

    /// Present only when job analysis was requested. Shapes vary by server
    /// release, so records stay as raw JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_statistics: Option<Vec<Value>>,

    #[serde(default)]
    pub projects_with_too_many_versions: Vec<ProjectRecord>,

    #[serde(default)]
    pub projects_without_an_owner: Vec<ProjectRecord>,

    #[serde(default)]
    pub versions_with_too_many_scans: Vec<VersionRecord>,

    #[serde(default)]
    pub versions_with_zero_scans: Vec<VersionRecord>,

    #[serde(default)]
    pub unmapped_scans: Vec<ScanRecord>,

    #[serde(default)]
    pub total_unmapped_scans: usize,

    #[serde(default)]
    pub high_frequency_scans: Vec<ScanRecord>,

    /// Projects fully fetched in this or a prior run. Sorted on
    /// serialization, which keeps checkpoints byte-stable.
    #[serde(default)]
    pub reviewed_projects: BTreeSet<String>,

    /// Versions fully fetched, keyed `"{project}:{version}"`.
    #[serde(default)]
    pub reviewed_versions: BTreeSet<String>,
}
