//! Backups ledger row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{BackupId, OwnerId};
use super::snapshot::{BackupType, Snapshot};

/// One entry in the append-only backups ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: BackupId,
    pub user_id: OwnerId,
    pub created_at: DateTime<Utc>,
    pub backup_type: BackupType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_description: Option<String>,

    /// Total records across all collections
    pub record_count: usize,

    /// The snapshot itself
    pub backup_data: Snapshot,
}

impl BackupRecord {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            id: BackupId::new(),
            user_id: snapshot.user_id,
            created_at: snapshot.timestamp,
            backup_type: snapshot.metadata.backup_type,
            backup_name: snapshot.metadata.backup_name.clone(),
            backup_description: snapshot.metadata.backup_description.clone(),
            record_count: snapshot.record_count(),
            backup_data: snapshot.clone(),
        }
    }

    /// Name for listings: the user's name, else the creation time
    pub fn display_name(&self) -> String {
        self.backup_name
            .clone()
            .unwrap_or_else(|| format!("Backup {}", self.created_at.format("%Y-%m-%d %H:%M")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotMetadata;

    #[test]
    fn test_from_snapshot_copies_metadata() {
        let metadata = SnapshotMetadata {
            backup_type: BackupType::Automatic,
            backup_name: Some("Before year end".into()),
            ..SnapshotMetadata::default()
        };
        let snapshot = Snapshot::new(OwnerId::new(), metadata);

        let record = BackupRecord::from_snapshot(&snapshot);
        assert_eq!(record.user_id, snapshot.user_id);
        assert_eq!(record.backup_type, BackupType::Automatic);
        assert_eq!(record.display_name(), "Before year end");
        assert_eq!(record.record_count, 0);
        assert_eq!(record.backup_data, snapshot);
    }
}
