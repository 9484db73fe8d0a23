//! Snapshot: a versioned export of one owner's data
//!
//! This is the durable file format shared by backup and restore:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "timestamp": "2026-10-16T09:30:00Z",
//!   "user_id": "550e8400-e29b-41d4-a716-446655440000",
//!   "data": { "invoices": [ ... ], "invoice_products": [ ... ] },
//!   "metadata": { "backup_type": "manual", "app_version": "0.3.0" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collection::Collection;
use super::ids::OwnerId;
use super::record::Record;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Whether the user asked for the backup or the app took it on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    #[default]
    Manual,
    Automatic,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Manual => "manual",
            BackupType::Automatic => "automatic",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata stored alongside the data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,

    pub backup_type: BackupType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_description: Option<String>,
}

/// A full export of one owner's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema version tag
    pub version: String,

    /// When the snapshot was built
    pub timestamp: DateTime<Utc>,

    /// Owner the data was exported from
    pub user_id: OwnerId,

    /// Records per collection, in backend order
    pub data: BTreeMap<Collection, Vec<Record>>,

    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Create an empty snapshot for an owner, stamped now
    pub fn new(user_id: OwnerId, metadata: SnapshotMetadata) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Utc::now(),
            user_id,
            data: BTreeMap::new(),
            metadata,
        }
    }

    /// Records of a collection; empty when the collection was not exported
    pub fn records(&self, collection: Collection) -> &[Record] {
        self.data
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, collection: Collection) -> bool {
        self.data.contains_key(&collection)
    }

    /// Total number of records across all collections
    pub fn record_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}
