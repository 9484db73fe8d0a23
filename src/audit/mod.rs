//! Audit logging for Invoicing Genius
//!
//! Every successful backup and restore, and every manually resolved sync
//! conflict, appends one `AuditEntry` to an append-only JSONL log.
//!
//! # Example
//!
//! ```rust,ignore
//! use invoicing_genius::audit::{AuditAction, AuditEntry, AuditLogger};
//!
//! let logger = AuditLogger::new(paths.audit_log());
//! let entry = AuditEntry::new(AuditAction::Restore, owner, &options)
//!     .with_summary(report.summary());
//! logger.append(&entry)?;
//! ```

mod entry;
mod logger;

pub use entry::{AuditAction, AuditEntry};
pub use logger::{AuditLogger, JsonlLog};
