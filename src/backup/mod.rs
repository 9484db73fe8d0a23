//! Backup and restore for Invoicing Genius
//!
//! Snapshots capture one owner's invoices, estimates, clients, products,
//! recurring schedules, profile and settings as a single document.
//!
//! # Architecture
//!
//! - `BackupBuilder`: reads the selected collections and records the backup
//!   in the ledger
//! - `BackupWriter`: renders a snapshot and hands it to a `DownloadSink`
//! - `RestoreEngine`: validates a document and replays it, either merging
//!   with fresh IDs or overwriting with the original ones
//!
//! # Example
//!
//! ```rust,ignore
//! use invoicing_genius::backup::{BackupBuilder, BackupOptions, BackupWriter, DirectorySink};
//! use invoicing_genius::backup::{RestoreEngine, RestoreOptions};
//!
//! let snapshot = BackupBuilder::new(&backend).build(owner, &BackupOptions::default())?;
//! let filename = BackupWriter::new(DirectorySink::new(downloads)).download(&snapshot, None)?;
//!
//! // Later, merge it back in
//! let report = RestoreEngine::new(&backend).restore(&snapshot, owner, &RestoreOptions::default())?;
//! println!("{}", report.summary());
//! ```

mod builder;
mod flags;
mod restore;
mod validate;
mod writer;

pub use builder::{BackupBuilder, BackupOptions};
pub use flags::IncludeFlags;
pub use restore::{CollectionOutcome, RestoreEngine, RestoreOptions, RestorePhase, RestoreReport};
pub use validate::{coverage_summary, read_document, validate_document};
pub use writer::{
    default_filename, render, BackupWriter, DirectorySink, DownloadSink, SnapshotFormat,
    FILENAME_PREFIX,
};
