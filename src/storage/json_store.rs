//! JSON-file backend for the local offline store
//!
//! Each collection lives in `data/<collection>.json` as `{"records": [...]}`.
//! Tables are loaded once when the backend is opened and written through
//! atomically after every mutation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::audit::{AuditEntry, AuditLogger, JsonlLog};
use crate::config::paths::InvoicingPaths;
use crate::error::{InvoicingError, InvoicingResult};
use crate::models::{BackupRecord, Collection, OwnerId, Record};

use super::file_io::{read_json, write_json_atomic};
use super::filter::Filter;
use super::table::Table;
use super::Backend;

/// Backend persisted as JSON files under the data directory
pub struct JsonFileBackend {
    paths: InvoicingPaths,
    tables: RwLock<HashMap<Collection, Table>>,
    ledger: JsonlLog<BackupRecord>,
    audit: AuditLogger,
}

impl JsonFileBackend {
    /// Open the store, creating directories and loading every collection
    pub fn open(paths: InvoicingPaths) -> InvoicingResult<Self> {
        paths.ensure_directories()?;

        let backend = Self {
            ledger: JsonlLog::new(paths.backups_ledger()),
            audit: AuditLogger::new(paths.audit_log()),
            tables: RwLock::new(HashMap::new()),
            paths,
        };
        backend.load_all()?;
        Ok(backend)
    }

    pub fn paths(&self) -> &InvoicingPaths {
        &self.paths
    }

    pub fn audit_log(&self) -> &AuditLogger {
        &self.audit
    }

    /// Reload every collection from disk
    pub fn load_all(&self) -> InvoicingResult<()> {
        let mut tables = self.tables.write().map_err(|e| {
            InvoicingError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        tables.clear();
        for collection in Collection::all() {
            let table: Table = read_json(self.paths.collection_file(*collection))?;
            tables.insert(*collection, table);
        }

        Ok(())
    }

    /// Apply `op` to one table and persist it if `op` succeeded
    fn mutate<T>(
        &self,
        collection: Collection,
        op: impl FnOnce(&mut Table) -> InvoicingResult<T>,
    ) -> InvoicingResult<T> {
        let mut tables = self.tables.write().map_err(|e| {
            InvoicingError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        // Work on a copy so a failed op or disk write leaves the cache as it was
        let mut staged = tables.get(&collection).cloned().unwrap_or_default();
        let result = op(&mut staged)?;
        write_json_atomic(self.paths.collection_file(collection), &staged)?;
        tables.insert(collection, staged);
        Ok(result)
    }
}

impl Backend for JsonFileBackend {
    fn select(&self, collection: Collection, filter: &Filter) -> InvoicingResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|e| {
            InvoicingError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(tables
            .get(&collection)
            .map(|t| t.select(filter))
            .unwrap_or_default())
    }

    fn insert(&self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        self.mutate(collection, |table| table.insert(collection, record))
    }

    fn insert_many(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> InvoicingResult<Vec<Record>> {
        // One file write for the whole batch
        self.mutate(collection, |table| {
            records
                .into_iter()
                .map(|record| table.insert(collection, record))
                .collect()
        })
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        changes: Record,
    ) -> InvoicingResult<Record> {
        self.mutate(collection, |table| table.update(collection, id, changes))
    }

    fn upsert(&self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        self.mutate(collection, |table| table.upsert(collection, record))
    }

    fn delete(&self, collection: Collection, filter: &Filter) -> InvoicingResult<usize> {
        self.mutate(collection, |table| Ok(table.delete(filter)))
    }

    fn record_backup(&self, record: &BackupRecord) -> InvoicingResult<()> {
        self.ledger.append(record)
    }

    fn list_backups(&self, owner: OwnerId) -> InvoicingResult<Vec<BackupRecord>> {
        let mut owned: Vec<_> = self
            .ledger
            .read_all()?
            .into_iter()
            .filter(|b| b.user_id == owner)
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    fn append_audit(&self, entry: &AuditEntry) -> InvoicingResult<()> {
        self.audit.append(entry)
    }
}
