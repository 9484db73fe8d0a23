//! Core data models for Invoicing Genius
//!
//! Collections and their links, schemaless records, owner/backup IDs, the
//! snapshot document exchanged between backup and restore, and the ledger
//! row written for every backup.

pub mod backup_record;
pub mod collection;
pub mod ids;
pub mod record;
pub mod snapshot;

pub use backup_record::BackupRecord;
pub use collection::{Collection, Link, Ownership};
pub use ids::{new_record_id, BackupId, OwnerId};
pub use record::Record;
pub use snapshot::{BackupType, Snapshot, SnapshotMetadata, SNAPSHOT_VERSION};
