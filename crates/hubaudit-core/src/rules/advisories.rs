//! Fixed advisory message templates.
//!
//! Message text is a contract: reports are compared as golden files, so
//! every template is whitespace-normalized before storage and must not be
//! reworded casually.

/// Collapse runs of whitespace, including embedded newlines, to single
/// spaces.
pub fn normalize_whitespace(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn too_many_versions(project: &str, num_versions: usize, threshold: usize) -> String {
    normalize_whitespace(&format!(
        "Project {project} has {num_versions} versions which is greater than
        the threshold of {threshold}. You should review these versions and remove
        extraneous ones, and their scans, to reclaim space and reduce clutter.
        Typically, there should be one version per development branch and one
        version per release. When new vulnerabilities are published you want to be
        able to quickly identify which projects are affected and take action;
        keeping a large number of un-released versions in the system will make
        that difficult. And accruing a large number of versions per project can
        lead to serious performance degradation."
    ))
}

pub fn no_owner(project: &str) -> String {
    normalize_whitespace(&format!(
        "Project {project} has no owner assigned. Assigning an owner is a good
        practice in case there are issues requiring their attention, such as
        problems with their scanning setup or the presence of a critical
        vulnerability or serious legal compliance issue."
    ))
}

pub fn too_many_scans(
    project: &str,
    version: &str,
    num_scans: usize,
    threshold: usize,
    bom_scans_over_threshold: Option<usize>,
) -> String {
    let mut message = format!(
        "Project {project}, version {version} has {num_scans} scans which is greater than
        the maximum recommended scans of {threshold}. Review the scans to make sure there
        are not redundant scans all mapped to this project version. Look for scans with
        similar names or sizes. If redundant scans are found, you should delete them and
        update the scanning setup to override scan names and avoid creating redundant
        scans."
    );
    if let Some(num_bom_scans) = bom_scans_over_threshold {
        message.push_str(&format!(
            " There are {num_bom_scans} BOM scans in this version. You should consider
            aggregating them into one scan, which will reduce the processing load on the
            server and usually reduce the time it takes to complete the scan."
        ));
    }
    normalize_whitespace(&message)
}

pub fn zero_scans(project: &str, version: &str) -> String {
    normalize_whitespace(&format!(
        "Project {project}, version {version} has 0 scans. You should review this version
        and delete it if it is not being used. One exception is if someone created this
        project-version to populate with components manually, i.e. no scans are mapped
        to it, but the BOM inside this version is populated by manually adding
        components to it."
    ))
}

pub fn unmapped_scan(scan: &str) -> String {
    normalize_whitespace(&format!(
        "This scan, {scan}, is not mapped to any project-version in the system. It should
        either be mapped to something or deleted to reclaim space and reduce clutter."
    ))
}

pub fn high_frequency_scan(summary_count: usize) -> String {
    normalize_whitespace(&format!(
        "This scan (aka code location) has two or more scans (out of {summary_count})
        that were run within 24 hours of each other, which may indicate a scan that is
        being run too often. Consider reducing the frequency to once per day."
    ))
}
