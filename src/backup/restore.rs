//! Restore engine
//!
//! Replays a snapshot into a backend, one collection at a time in
//! dependency order:
//!
//! ```text
//! validating -> restoring:<collection> ... -> logging -> done
//!      \______________ any failure ______________/-> failed
//! ```
//!
//! In overwrite mode the owner's existing rows are deleted first and
//! primary keys are preserved. Otherwise every row gets a fresh ID and child
//! foreign keys are rewritten through a per-collection old -> new map;
//! children whose parent did not make it are dropped.
//!
//! The run is not atomic: a failure leaves earlier collections applied.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEntry};
use crate::error::{InvoicingError, InvoicingResult};
use crate::models::record::{record_id, set_string, string_field, ID_COLUMN, OWNER_COLUMN};
use crate::models::{new_record_id, Collection, OwnerId, Ownership, Record, Snapshot};
use crate::storage::{Backend, Filter};

use super::builder::owner_filter;
use super::flags::IncludeFlags;
use super::validate::validate_document;

/// What to restore and how
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOptions {
    #[serde(default)]
    pub include: IncludeFlags,

    /// Delete the owner's rows first and keep the snapshot's primary keys
    #[serde(default)]
    pub overwrite_existing: bool,
}

/// Where a restore run is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Validating,
    Restoring(Collection),
    Logging,
    Done,
    Failed,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorePhase::Validating => write!(f, "validating"),
            RestorePhase::Restoring(c) => write!(f, "restoring:{}", c),
            RestorePhase::Logging => write!(f, "logging"),
            RestorePhase::Done => write!(f, "done"),
            RestorePhase::Failed => write!(f, "failed"),
        }
    }
}

/// Per-collection counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOutcome {
    pub inserted: usize,
    pub deleted: usize,
    /// Children dropped because their parent was not restored
    pub orphaned: usize,
}

/// Result of a completed restore
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub snapshot_version: String,
    pub backup_date: DateTime<Utc>,
    pub overwrite: bool,
    pub outcomes: BTreeMap<Collection, CollectionOutcome>,
    /// Collections present in the snapshot but not applied
    pub skipped: Vec<Collection>,
    pub phase: RestorePhase,
}

impl RestoreReport {
    fn new(snapshot: &Snapshot, overwrite: bool) -> Self {
        Self {
            snapshot_version: snapshot.version.clone(),
            backup_date: snapshot.timestamp,
            overwrite,
            outcomes: BTreeMap::new(),
            skipped: Vec::new(),
            phase: RestorePhase::Validating,
        }
    }

    pub fn outcome(&self, collection: Collection) -> CollectionOutcome {
        self.outcomes.get(&collection).copied().unwrap_or_default()
    }

    pub fn total_inserted(&self) -> usize {
        self.outcomes.values().map(|o| o.inserted).sum()
    }

    pub fn total_orphaned(&self) -> usize {
        self.outcomes.values().map(|o| o.orphaned).sum()
    }

    pub fn summary(&self) -> String {
        let restored: Vec<String> = self
            .outcomes
            .iter()
            .filter(|(_, o)| o.inserted > 0)
            .map(|(c, o)| format!("{} ({})", c, o.inserted))
            .collect();

        let mut summary = if restored.is_empty() {
            "Restored: nothing".to_string()
        } else {
            format!("Restored: {}", restored.join(", "))
        };

        let orphaned = self.total_orphaned();
        if orphaned > 0 {
            summary.push_str(&format!("; dropped {} orphaned line item(s)", orphaned));
        }
        if !self.skipped.is_empty() {
            let skipped: Vec<&str> = self.skipped.iter().map(|c| c.as_str()).collect();
            summary.push_str(&format!("; skipped {}", skipped.join(", ")));
        }
        summary
    }
}

/// Applies snapshots to a backend
pub struct RestoreEngine<B> {
    backend: B,
}

impl<B: Backend> RestoreEngine<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Validate an untyped document and restore it
    ///
    /// Nothing touches the backend unless validation passes.
    pub fn restore_document(
        &self,
        document: &Value,
        owner: OwnerId,
        options: &RestoreOptions,
    ) -> InvoicingResult<RestoreReport> {
        debug!(phase = %RestorePhase::Validating, "restore started");
        let snapshot = validate_document(document).map_err(|e| {
            warn!(phase = %RestorePhase::Failed, error = %e, "snapshot rejected");
            e
        })?;
        self.apply(&snapshot, owner, options)
    }

    /// Restore a typed snapshot, re-checking its shape first
    pub fn restore(
        &self,
        snapshot: &Snapshot,
        owner: OwnerId,
        options: &RestoreOptions,
    ) -> InvoicingResult<RestoreReport> {
        let document = serde_json::to_value(snapshot)?;
        self.restore_document(&document, owner, options)
    }

    fn apply(
        &self,
        snapshot: &Snapshot,
        owner: OwnerId,
        options: &RestoreOptions,
    ) -> InvoicingResult<RestoreReport> {
        if snapshot.user_id != owner {
            info!(
                from = %snapshot.user_id.short(),
                to = %owner.short(),
                "restoring into a different owner"
            );
        }

        let mut run = RestoreRun {
            backend: &self.backend,
            owner,
            overwrite: options.overwrite_existing,
            id_maps: HashMap::new(),
            purged: HashSet::new(),
            report: RestoreReport::new(snapshot, options.overwrite_existing),
        };

        let result = run.restore_all(snapshot, &options.include).and_then(|_| {
            run.transition(RestorePhase::Logging);
            let entry = AuditEntry::new(AuditAction::Restore, owner, options)
                .with_summary(run.report.summary());
            self.backend.append_audit(&entry)
        });

        match result {
            Ok(()) => {
                run.transition(RestorePhase::Done);
                info!(
                    owner = %owner.short(),
                    inserted = run.report.total_inserted(),
                    orphaned = run.report.total_orphaned(),
                    overwrite = options.overwrite_existing,
                    "restore complete"
                );
                Ok(run.report)
            }
            Err(e) => {
                warn!(phase = %run.report.phase, error = %e, "restore failed");
                run.transition(RestorePhase::Failed);
                Err(e)
            }
        }
    }
}

/// State for one restore call; dropped when the call returns
struct RestoreRun<'a, B> {
    backend: &'a B,
    owner: OwnerId,
    overwrite: bool,
    /// old id -> inserted id, per collection
    id_maps: HashMap<Collection, HashMap<String, String>>,
    purged: HashSet<Collection>,
    report: RestoreReport,
}

impl<'a, B: Backend> RestoreRun<'a, B> {
    fn transition(&mut self, phase: RestorePhase) {
        debug!(from = %self.report.phase, to = %phase, "restore phase");
        self.report.phase = phase;
    }

    fn restore_all(&mut self, snapshot: &Snapshot, include: &IncludeFlags) -> InvoicingResult<()> {
        if self.overwrite {
            self.check_key_ownership(snapshot, include)?;
        }

        for collection in Collection::RESTORE_ORDER {
            if !snapshot.contains(collection) {
                continue;
            }

            if !include.includes(collection) {
                self.report.skipped.push(collection);
                continue;
            }

            // Merging a singleton has no sensible meaning
            if collection.is_singleton() && !self.overwrite {
                debug!(%collection, "singleton skipped outside overwrite mode");
                self.report.skipped.push(collection);
                continue;
            }

            self.transition(RestorePhase::Restoring(collection));
            self.restore_collection(collection, snapshot.records(collection))?;
        }
        Ok(())
    }

    fn restore_collection(
        &mut self,
        collection: Collection,
        records: &[Record],
    ) -> InvoicingResult<()> {
        if self.overwrite {
            self.purge(collection)?;
        }

        let mut taken = if self.overwrite {
            HashSet::new()
        } else {
            self.existing_ids(collection)?
        };

        let records = if collection.is_singleton() {
            &records[..records.len().min(1)]
        } else {
            records
        };

        let mut id_map = HashMap::new();
        let mut outcome = self.report.outcome(collection);

        for source in records {
            let mut record = source.clone();
            let old_id = record_id(&record);

            if !self.relink_parent(collection, &mut record, old_id.as_deref()) {
                outcome.orphaned += 1;
                continue;
            }
            self.relink_soft(collection, &mut record);

            match collection.ownership() {
                Ownership::UserColumn => set_string(&mut record, OWNER_COLUMN, self.owner.to_string()),
                Ownership::Singleton => set_string(&mut record, ID_COLUMN, self.owner.to_string()),
                Ownership::Parent(_) => {}
            }

            if !collection.is_singleton() {
                let new_id = match (&old_id, self.overwrite) {
                    (Some(id), true) => id.clone(),
                    _ => fresh_id(&mut taken),
                };
                set_string(&mut record, ID_COLUMN, new_id);
            }

            let inserted = self
                .backend
                .insert(collection, record)
                .map_err(|e| InvoicingError::write(collection, e.to_string()))?;

            if let (Some(old), Some(new)) = (old_id, record_id(&inserted)) {
                id_map.insert(old, new);
            }
            outcome.inserted += 1;
        }

        debug!(
            %collection,
            inserted = outcome.inserted,
            orphaned = outcome.orphaned,
            "collection restored"
        );
        self.id_maps.insert(collection, id_map);
        self.report.outcomes.insert(collection, outcome);
        Ok(())
    }

    /// Rewrite the hard parent key; false when the parent is missing
    fn relink_parent(&self, collection: Collection, record: &mut Record, id: Option<&str>) -> bool {
        let Some(link) = collection.parent_link() else {
            return true;
        };

        let new_parent = string_field(record, link.column).and_then(|old| {
            self.id_maps
                .get(&link.target)
                .and_then(|map| map.get(&old))
                .cloned()
        });

        match new_parent {
            Some(parent) => {
                set_string(record, link.column, parent);
                true
            }
            None => {
                warn!(
                    %collection,
                    id = id.unwrap_or("<none>"),
                    parent = %link.target,
                    "dropping record whose parent was not restored"
                );
                false
            }
        }
    }

    /// Rewrite optional references whose target was restored in this run
    fn relink_soft(&self, collection: Collection, record: &mut Record) {
        for link in collection.soft_links() {
            let Some(map) = self.id_maps.get(&link.target) else {
                continue;
            };
            if let Some(new) = string_field(record, link.column).and_then(|old| map.get(&old).cloned()) {
                set_string(record, link.column, new);
            }
        }
    }

    /// Fail before any delete if a preserved key is held by another owner
    fn check_key_ownership(&self, snapshot: &Snapshot, include: &IncludeFlags) -> InvoicingResult<()> {
        let owner = self.owner.to_string();
        let mut clashes = Vec::new();

        for collection in Collection::RESTORE_ORDER {
            // Singleton keys are the owner's own ID
            if !snapshot.contains(collection) || !include.includes(collection) || collection.is_singleton() {
                continue;
            }

            let ids: Vec<String> = snapshot.records(collection).iter().filter_map(record_id).collect();
            let filter = Filter::is_in(ID_COLUMN, ids);
            if filter.is_empty_membership() {
                continue;
            }
            let existing = self
                .backend
                .select(collection, &filter)
                .map_err(|e| InvoicingError::fetch(collection, e.to_string()))?;
            if existing.is_empty() {
                continue;
            }

            let foreign = match collection.ownership() {
                Ownership::Parent(link) => {
                    let parents = self.owned_ids(link.target)?;
                    existing
                        .iter()
                        .filter(|r| string_field(r, link.column).map_or(true, |p| !parents.contains(&p)))
                        .count()
                }
                _ => existing
                    .iter()
                    .filter(|r| string_field(r, OWNER_COLUMN).as_deref() != Some(owner.as_str()))
                    .count(),
            };
            if foreign > 0 {
                clashes.push(format!("{} ({})", collection, foreign));
            }
        }

        if clashes.is_empty() {
            Ok(())
        } else {
            Err(InvoicingError::Conflict(format!(
                "Cannot overwrite: snapshot keys belong to another owner in {}",
                clashes.join(", ")
            )))
        }
    }

    /// Delete the owner's rows in `collection`, children first
    fn purge(&mut self, collection: Collection) -> InvoicingResult<()> {
        if !self.purged.insert(collection) {
            return Ok(());
        }
        for child in collection.children() {
            self.purge(child)?;
        }

        let filter = match collection.ownership() {
            Ownership::Parent(link) => {
                let filter = Filter::is_in(link.column, self.owned_ids(link.target)?);
                if filter.is_empty_membership() {
                    return Ok(());
                }
                filter
            }
            _ => owner_filter(collection, self.owner),
        };

        let deleted = self
            .backend
            .delete(collection, &filter)
            .map_err(|e| InvoicingError::write(collection, e.to_string()))?;

        if deleted > 0 {
            debug!(%collection, deleted, "existing rows removed");
        }
        self.report
            .outcomes
            .entry(collection)
            .or_default()
            .deleted += deleted;
        Ok(())
    }

    /// IDs already present for this owner, so fresh ones never collide
    fn existing_ids(&self, collection: Collection) -> InvoicingResult<HashSet<String>> {
        if collection.parent_link().is_some() {
            return Ok(HashSet::new());
        }
        self.owned_ids(collection)
    }

    /// Primary keys of the owner's rows in a top-level collection
    fn owned_ids(&self, collection: Collection) -> InvoicingResult<HashSet<String>> {
        let rows = self
            .backend
            .select(collection, &owner_filter(collection, self.owner))
            .map_err(|e| InvoicingError::fetch(collection, e.to_string()))?;
        Ok(rows.iter().filter_map(record_id).collect())
    }
}

fn fresh_id(taken: &mut HashSet<String>) -> String {
    loop {
        let id = new_record_id();
        if taken.insert(id.clone()) {
            return id;
        }
    }
}
