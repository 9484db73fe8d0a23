//! In-memory backend
//!
//! Counts every call and can be told to fail selects or inserts on a given
//! collection, which is how the engine's abort paths get exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::audit::AuditEntry;
use crate::error::{InvoicingError, InvoicingResult};
use crate::models::{BackupRecord, Collection, OwnerId, Record};

use super::filter::Filter;
use super::table::Table;
use super::Backend;

/// Number of calls made against the backend, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallStats {
    pub selects: usize,
    pub inserts: usize,
    pub updates: usize,
    pub upserts: usize,
    pub deletes: usize,
    pub ledger_writes: usize,
}

impl CallStats {
    /// Every call that could have changed state
    pub fn writes(&self) -> usize {
        self.inserts + self.updates + self.upserts + self.deletes + self.ledger_writes
    }

    pub fn total(&self) -> usize {
        self.selects + self.writes()
    }
}

#[derive(Default)]
struct Counters {
    selects: AtomicUsize,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    upserts: AtomicUsize,
    deletes: AtomicUsize,
    ledger_writes: AtomicUsize,
}

/// Backend that keeps every table in process
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<Collection, Table>>,
    backups: RwLock<Vec<BackupRecord>>,
    audit: RwLock<Vec<AuditEntry>>,
    counters: Counters,
    failing_selects: RwLock<HashSet<Collection>>,
    failing_inserts: RwLock<HashSet<Collection>>,
}

fn lock_error<E: std::fmt::Display>(e: E) -> InvoicingError {
    InvoicingError::Storage(format!("Failed to acquire lock: {}", e))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rows directly, bypassing counters and fault injection
    pub fn seed(&self, collection: Collection, records: Vec<Record>) -> InvoicingResult<()> {
        let mut tables = self.tables.write().map_err(lock_error)?;
        let table = tables.entry(collection).or_default();
        for record in records {
            table.insert(collection, record)?;
        }
        Ok(())
    }

    /// Every row of a collection, bypassing counters
    pub fn rows(&self, collection: Collection) -> Vec<Record> {
        self.tables
            .read()
            .map(|tables| {
                tables
                    .get(&collection)
                    .map(|t| t.records.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Make every select from `collection` fail
    pub fn fail_selects_from(&self, collection: Collection) {
        if let Ok(mut set) = self.failing_selects.write() {
            set.insert(collection);
        }
    }

    /// Make every insert into `collection` fail
    pub fn fail_inserts_into(&self, collection: Collection) {
        if let Ok(mut set) = self.failing_inserts.write() {
            set.insert(collection);
        }
    }

    pub fn stats(&self) -> CallStats {
        let c = &self.counters;
        CallStats {
            selects: c.selects.load(Ordering::SeqCst),
            inserts: c.inserts.load(Ordering::SeqCst),
            updates: c.updates.load(Ordering::SeqCst),
            upserts: c.upserts.load(Ordering::SeqCst),
            deletes: c.deletes.load(Ordering::SeqCst),
            ledger_writes: c.ledger_writes.load(Ordering::SeqCst),
        }
    }

    /// Audit entries appended so far, oldest first
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.read().map(|a| a.clone()).unwrap_or_default()
    }

    fn is_failing(set: &RwLock<HashSet<Collection>>, collection: Collection) -> bool {
        set.read().map(|s| s.contains(&collection)).unwrap_or(false)
    }
}

impl Backend for MemoryBackend {
    fn select(&self, collection: Collection, filter: &Filter) -> InvoicingResult<Vec<Record>> {
        self.counters.selects.fetch_add(1, Ordering::SeqCst);
        if Self::is_failing(&self.failing_selects, collection) {
            return Err(InvoicingError::Storage(format!(
                "select from {} refused",
                collection
            )));
        }

        let tables = self.tables.read().map_err(lock_error)?;
        Ok(tables
            .get(&collection)
            .map(|t| t.select(filter))
            .unwrap_or_default())
    }

    fn insert(&self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        self.counters.inserts.fetch_add(1, Ordering::SeqCst);
        if Self::is_failing(&self.failing_inserts, collection) {
            return Err(InvoicingError::Storage(format!(
                "insert into {} refused",
                collection
            )));
        }

        let mut tables = self.tables.write().map_err(lock_error)?;
        tables.entry(collection).or_default().insert(collection, record)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        changes: Record,
    ) -> InvoicingResult<Record> {
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().map_err(lock_error)?;
        tables
            .entry(collection)
            .or_default()
            .update(collection, id, changes)
    }

    fn upsert(&self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        self.counters.upserts.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().map_err(lock_error)?;
        tables.entry(collection).or_default().upsert(collection, record)
    }

    fn delete(&self, collection: Collection, filter: &Filter) -> InvoicingResult<usize> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.write().map_err(lock_error)?;
        Ok(tables
            .get_mut(&collection)
            .map(|t| t.delete(filter))
            .unwrap_or(0))
    }

    fn record_backup(&self, record: &BackupRecord) -> InvoicingResult<()> {
        self.counters.ledger_writes.fetch_add(1, Ordering::SeqCst);
        self.backups.write().map_err(lock_error)?.push(record.clone());
        Ok(())
    }

    fn list_backups(&self, owner: OwnerId) -> InvoicingResult<Vec<BackupRecord>> {
        let backups = self.backups.read().map_err(lock_error)?;
        let mut owned: Vec<_> = backups
            .iter()
            .filter(|b| b.user_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    fn append_audit(&self, entry: &AuditEntry) -> InvoicingResult<()> {
        self.counters.ledger_writes.fetch_add(1, Ordering::SeqCst);
        self.audit.write().map_err(lock_error)?.push(entry.clone());
        Ok(())
    }
}
