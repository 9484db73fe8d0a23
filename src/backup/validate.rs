//! Snapshot shape validation
//!
//! Checks the container shape of an incoming document (top-level fields,
//! `data` as an object of arrays of objects, `metadata` fields) and reports
//! every problem at once. Business fields inside records are not checked.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{InvoicingError, InvoicingResult};
use crate::models::{BackupType, Collection, OwnerId, Record, Snapshot, SnapshotMetadata};

use super::writer::SnapshotFormat;

const OPTIONAL_METADATA: [&str; 4] = [
    "app_version",
    "device_info",
    "backup_name",
    "backup_description",
];

/// Read a backup file (JSON or YAML) into an untyped document
pub fn read_document(path: &Path) -> InvoicingResult<Value> {
    let contents = fs::read_to_string(path).map_err(|e| {
        InvoicingError::Io(format!("Failed to read backup file {}: {}", path.display(), e))
    })?;

    match SnapshotFormat::from_path(path) {
        SnapshotFormat::Json => serde_json::from_str(&contents)
            .map_err(|e| InvoicingError::Json(format!("Failed to parse backup file: {}", e))),
        SnapshotFormat::Yaml => serde_yaml::from_str(&contents)
            .map_err(|e| InvoicingError::Yaml(format!("Failed to parse backup file: {}", e))),
    }
}

/// Validate a document and convert it into a typed snapshot
///
/// Collections this version does not know are ignored with a warning.
pub fn validate_document(document: &Value) -> InvoicingResult<Snapshot> {
    let Some(root) = document.as_object() else {
        return Err(InvoicingError::validation("snapshot must be an object"));
    };

    let mut issues = Vec::new();

    let version = required_string(root, "version", &mut issues);

    let timestamp = required_string(root, "timestamp", &mut issues).and_then(|raw| {
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => {
                issues.push(format!("`timestamp` is not an ISO-8601 date-time: {}", raw));
                None
            }
        }
    });

    let user_id = required_string(root, "user_id", &mut issues).and_then(|raw| {
        match OwnerId::parse(&raw) {
            Ok(id) => Some(id),
            Err(_) => {
                issues.push(format!("`user_id` is not a valid identifier: {}", raw));
                None
            }
        }
    });

    let data = match root.get("data") {
        None => {
            issues.push("missing field `data`".to_string());
            None
        }
        Some(Value::Object(map)) => Some(check_data(map, &mut issues)),
        Some(_) => {
            issues.push("`data` must be an object".to_string());
            None
        }
    };

    let metadata = match root.get("metadata") {
        None => {
            issues.push("missing field `metadata`".to_string());
            None
        }
        Some(Value::Object(map)) => check_metadata(map, &mut issues),
        Some(_) => {
            issues.push("`metadata` must be an object".to_string());
            None
        }
    };

    match (version, timestamp, user_id, data, metadata) {
        (Some(version), Some(timestamp), Some(user_id), Some(data), Some(metadata))
            if issues.is_empty() =>
        {
            Ok(Snapshot {
                version,
                timestamp,
                user_id,
                data,
                metadata,
            })
        }
        _ => Err(InvoicingError::Validation(issues)),
    }
}

fn required_string(root: &Map<String, Value>, field: &str, issues: &mut Vec<String>) -> Option<String> {
    match root.get(field) {
        None => {
            issues.push(format!("missing field `{}`", field));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(format!("`{}` must be a string", field));
            None
        }
    }
}

fn check_data(
    map: &Map<String, Value>,
    issues: &mut Vec<String>,
) -> BTreeMap<Collection, Vec<Record>> {
    let mut data = BTreeMap::new();

    for (name, value) in map {
        let Value::Array(items) = value else {
            issues.push(format!("`data.{}` must be an array", name));
            continue;
        };

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::Object(record) => records.push(record.clone()),
                _ => issues.push(format!("`data.{}[{}]` must be an object", name, index)),
            }
        }

        match name.parse::<Collection>() {
            Ok(collection) if collection.as_str() == name => {
                data.insert(collection, records);
            }
            _ => warn!(collection = %name, "ignoring unknown collection in snapshot"),
        }
    }

    data
}

fn check_metadata(map: &Map<String, Value>, issues: &mut Vec<String>) -> Option<SnapshotMetadata> {
    let backup_type = match map.get("backup_type") {
        None => {
            issues.push("missing field `metadata.backup_type`".to_string());
            None
        }
        Some(Value::String(s)) if s == "manual" => Some(BackupType::Manual),
        Some(Value::String(s)) if s == "automatic" => Some(BackupType::Automatic),
        Some(other) => {
            issues.push(format!(
                "`metadata.backup_type` must be \"manual\" or \"automatic\", got {}",
                other
            ));
            None
        }
    };

    let mut optional = BTreeMap::new();
    for field in OPTIONAL_METADATA {
        match map.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => {
                optional.insert(field, s.clone());
            }
            Some(_) => issues.push(format!("`metadata.{}` must be a string", field)),
        }
    }

    backup_type.map(|backup_type| SnapshotMetadata {
        app_version: optional.remove("app_version"),
        device_info: optional.remove("device_info"),
        backup_type,
        backup_name: optional.remove("backup_name"),
        backup_description: optional.remove("backup_description"),
    })
}

/// One-line description of what a snapshot covers
pub fn coverage_summary(snapshot: &Snapshot) -> String {
    let (present, missing): (Vec<_>, Vec<_>) = Collection::all()
        .iter()
        .partition(|c| snapshot.contains(**c));

    if missing.is_empty() {
        format!("Complete backup (v{})", snapshot.version)
    } else {
        let names = |cs: Vec<&Collection>| {
            cs.iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "Partial backup (v{}): has {}, missing {}",
            snapshot.version,
            if present.is_empty() { "nothing".to_string() } else { names(present) },
            names(missing)
        )
    }
}
