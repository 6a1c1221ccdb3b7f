//! Attribute projection for raw server records.
//!
//! Server-side JSON records are variably shaped across releases and carry
//! far more fields than the report needs. Projection copies only an
//! allow-listed subset into a flat record, tags it with the entity's
//! canonical URL taken from its `_meta.href` self-link, and attaches any
//! caller-supplied context pairs (e.g. the parent project name).

use serde_json::{Map, Value};
use thiserror::Error;

/// Fields copied from raw records into projected ones, across all entity
/// kinds. Fields absent from a given record are simply not copied.
pub const COMMON_ATTRIBUTES: &[&str] = &[
    "baseDirectory",
    "createdAt",
    "createdBy",
    "createdByUserName",
    "directoryCount",
    "distribution",
    "enabled",
    "fileCount",
    "hostName",
    "mappedProjectVersion",
    "matchCount",
    "name",
    "num_bom_scans",
    "num_scans",
    "num_versions",
    "phase",
    "projectOwner",
    "scans",
    "scanSize",
    "scanType",
    "scan_summaries",
    "serverVersion",
    "settingUpdatedAt",
    "status",
    "statusMessage",
    "updatedAt",
    "updatedBy",
    "versionName",
    "versions",
];

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The record carries no `_meta.href` self-link, so it cannot be
    /// identified or revisited. Treated as a fetch failure for the record.
    #[error("record `{name}` has no _meta.href self-link")]
    MissingSelfLink { name: String },
}

/// Extract the canonical URL of a raw record from its `_meta.href`.
pub fn self_link(raw: &Value) -> Result<&str, ProjectionError> {
    raw.get("_meta")
        .and_then(|m| m.get("href"))
        .and_then(Value::as_str)
        .ok_or_else(|| ProjectionError::MissingSelfLink {
            name: record_name(raw).to_string(),
        })
}

/// Best-effort display name for diagnostics; raw records are not required
/// to carry one.
pub fn record_name(raw: &Value) -> &str {
    raw.get("name")
        .or_else(|| raw.get("versionName"))
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
}

/// Project a raw record onto the attribute allow-list.
///
/// Pure function of its inputs: allow-listed keys present in `raw`, plus a
/// mandatory `url` from the self-link, plus `context` pairs verbatim.
pub fn project_record(raw: &Value, context: &[(&str, &str)]) -> Result<Value, ProjectionError> {
    let url = self_link(raw)?.to_string();

    let mut projected = Map::new();
    if let Some(fields) = raw.as_object() {
        for attr in COMMON_ATTRIBUTES {
            if let Some(value) = fields.get(*attr) {
                projected.insert((*attr).to_string(), value.clone());
            }
        }
    }
    projected.insert("url".to_string(), Value::String(url));
    for (key, value) in context {
        projected.insert((*key).to_string(), Value::String((*value).to_string()));
    }

    Ok(Value::Object(projected))
}
