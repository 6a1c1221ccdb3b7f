use crate::session::RunMode;

/// Tuning knobs for an audit run.
///
/// Every threshold has a documented default; external `key=value` style
/// arguments are parsed into this struct at the CLI boundary, never inside
/// the rules themselves.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Projects with more versions than this are flagged.
    pub max_versions_per_project: usize,

    /// Versions with more scans than this are flagged.
    pub max_scans_per_version: usize,

    /// Age cutoff, in days, carried for downstream cleanup tooling.
    /// The unmapped-scan rule itself is age-independent.
    pub max_age_for_unmapped_scans: u32,

    /// Collect and store job statistics from the server.
    pub analyze_jobs: bool,

    /// Start fresh or resume from a prior report artifact.
    pub mode: RunMode,

    /// Server-side page size used when draining paginated collections.
    pub page_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_versions_per_project: 20,
            max_scans_per_version: 10,
            max_age_for_unmapped_scans: 365,
            analyze_jobs: false,
            mode: RunMode::New,
            page_size: 1000,
        }
    }
}
