//! Storage layer for Invoicing Genius
//!
//! Backup, restore and sync talk to the data store only through the
//! [`Backend`] trait, a rows-as-documents store with per-collection
//! select/insert/update/upsert/delete plus the two append-only ledgers.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryBackend`]: everything in process, with call counters and fault
//!   injection; used by tests and restore dry runs.
//! - [`JsonFileBackend`]: the local offline store, one JSON file per
//!   collection written atomically, JSONL ledgers.

pub mod file_io;
pub mod filter;
pub mod json_store;
pub mod memory;
pub mod table;

pub use file_io::{read_json, write_json_atomic};
pub use filter::Filter;
pub use json_store::JsonFileBackend;
pub use memory::{CallStats, MemoryBackend};
pub use table::Table;

use crate::audit::AuditEntry;
use crate::error::InvoicingResult;
use crate::models::{BackupRecord, Collection, OwnerId, Record};

/// Rows-as-documents store scoped by collection
///
/// Schema enforcement is the backend's job; callers only rely on primary
/// keys being unique within a collection.
pub trait Backend {
    /// Rows of `collection` matching `filter`, in storage order
    fn select(&self, collection: Collection, filter: &Filter) -> InvoicingResult<Vec<Record>>;

    /// Insert a new row and return it as stored
    fn insert(&self, collection: Collection, record: Record) -> InvoicingResult<Record>;

    /// Insert several rows, stopping at the first failure
    ///
    /// Backends with a bulk path should override this.
    fn insert_many(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> InvoicingResult<Vec<Record>> {
        records
            .into_iter()
            .map(|record| self.insert(collection, record))
            .collect()
    }

    /// Merge `changes` into the row with primary key `id`
    fn update(&self, collection: Collection, id: &str, changes: Record)
        -> InvoicingResult<Record>;

    /// Replace the row with the same primary key, or insert it
    fn upsert(&self, collection: Collection, record: Record) -> InvoicingResult<Record>;

    /// Delete matching rows and return the count
    fn delete(&self, collection: Collection, filter: &Filter) -> InvoicingResult<usize>;

    /// Append to the backups ledger
    fn record_backup(&self, record: &BackupRecord) -> InvoicingResult<()>;

    /// Ledger entries for one owner, newest first
    fn list_backups(&self, owner: OwnerId) -> InvoicingResult<Vec<BackupRecord>>;

    /// Append to the audit log
    fn append_audit(&self, entry: &AuditEntry) -> InvoicingResult<()>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn select(&self, collection: Collection, filter: &Filter) -> InvoicingResult<Vec<Record>> {
        (**self).select(collection, filter)
    }

    fn insert(&self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        (**self).insert(collection, record)
    }

    fn insert_many(
        &self,
        collection: Collection,
        records: Vec<Record>,
    ) -> InvoicingResult<Vec<Record>> {
        (**self).insert_many(collection, records)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        changes: Record,
    ) -> InvoicingResult<Record> {
        (**self).update(collection, id, changes)
    }

    fn upsert(&self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        (**self).upsert(collection, record)
    }

    fn delete(&self, collection: Collection, filter: &Filter) -> InvoicingResult<usize> {
        (**self).delete(collection, filter)
    }

    fn record_backup(&self, record: &BackupRecord) -> InvoicingResult<()> {
        (**self).record_backup(record)
    }

    fn list_backups(&self, owner: OwnerId) -> InvoicingResult<Vec<BackupRecord>> {
        (**self).list_backups(owner)
    }

    fn append_audit(&self, entry: &AuditEntry) -> InvoicingResult<()> {
        (**self).append_audit(entry)
    }
}
