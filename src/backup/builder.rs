//! Backup builder
//!
//! Reads one owner's rows across the selected collections and assembles a
//! snapshot. Line items are fetched by membership in the parent IDs just
//! read. Any failed read aborts the build and nothing reaches the ledger.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::{InvoicingError, InvoicingResult};
use crate::models::record::record_id;
use crate::models::{
    BackupRecord, BackupType, Collection, OwnerId, Ownership, Record, Snapshot, SnapshotMetadata,
};
use crate::storage::{Backend, Filter};

use super::flags::IncludeFlags;

/// What to back up and how to label it
#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    pub include: IncludeFlags,
    pub backup_type: BackupType,
    pub backup_name: Option<String>,
    pub backup_description: Option<String>,
    pub app_version: Option<String>,
    pub device_info: Option<String>,
}

impl BackupOptions {
    fn metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            app_version: self.app_version.clone(),
            device_info: self.device_info.clone(),
            backup_type: self.backup_type,
            backup_name: self.backup_name.clone(),
            backup_description: self.backup_description.clone(),
        }
    }
}

/// Builds snapshots from a backend
pub struct BackupBuilder<B> {
    backend: B,
}

impl<B: Backend> BackupBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Build a snapshot and append it to the backups ledger
    pub fn build(&self, owner: OwnerId, options: &BackupOptions) -> InvoicingResult<Snapshot> {
        let mut snapshot = Snapshot::new(owner, options.metadata());
        snapshot.data = self.gather(owner, &options.include)?;

        self.backend
            .record_backup(&BackupRecord::from_snapshot(&snapshot))?;

        info!(
            owner = %owner.short(),
            records = snapshot.record_count(),
            backup_type = %snapshot.metadata.backup_type,
            "backup created"
        );

        Ok(snapshot)
    }

    fn gather(
        &self,
        owner: OwnerId,
        include: &IncludeFlags,
    ) -> InvoicingResult<BTreeMap<Collection, Vec<Record>>> {
        let mut data = BTreeMap::new();

        for collection in Collection::TOP_LEVEL {
            if !include.includes(collection) {
                continue;
            }

            let rows = self.fetch(collection, &owner_filter(collection, owner))?;

            let children = collection.children();
            if !children.is_empty() {
                let parent_ids: Vec<String> = rows.iter().filter_map(record_id).collect();
                for child in children {
                    let child_rows = self.fetch_children(child, &parent_ids)?;
                    data.insert(child, child_rows);
                }
            }

            data.insert(collection, rows);
        }

        Ok(data)
    }

    fn fetch_children(
        &self,
        child: Collection,
        parent_ids: &[String],
    ) -> InvoicingResult<Vec<Record>> {
        let link = child
            .parent_link()
            .ok_or_else(|| InvoicingError::fetch(child, "collection has no parent link"))?;

        let filter = Filter::is_in(link.column, parent_ids.iter().cloned());

        // Nothing to match; skip the round trip
        if filter.is_empty_membership() {
            return Ok(Vec::new());
        }

        self.fetch(child, &filter)
    }

    fn fetch(&self, collection: Collection, filter: &Filter) -> InvoicingResult<Vec<Record>> {
        let rows = self
            .backend
            .select(collection, filter)
            .map_err(|e| InvoicingError::fetch(collection, e.to_string()))?;
        debug!(%collection, rows = rows.len(), "fetched");
        Ok(rows)
    }
}

/// Rows belonging to `owner` in a top-level collection
pub(crate) fn owner_filter(collection: Collection, owner: OwnerId) -> Filter {
    match collection.ownership() {
        Ownership::Singleton => Filter::by_id(owner.to_string()),
        _ => Filter::owned_by(owner),
    }
}
