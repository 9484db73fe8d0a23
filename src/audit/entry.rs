//! Audit entry data structures
//!
//! One entry per completed backup, restore, or resolved sync conflict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::OwnerId;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Backup,
    Restore,
    SyncResolve,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Backup => write!(f, "BACKUP"),
            AuditAction::Restore => write!(f, "RESTORE"),
            AuditAction::SyncResolve => write!(f, "SYNC_RESOLVE"),
        }
    }
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the action completed (UTC)
    pub timestamp: DateTime<Utc>,

    pub action: AuditAction,

    /// Owner whose data was touched
    pub user_id: OwnerId,

    /// Options the action ran with, as given by the caller
    #[serde(default)]
    pub options: serde_json::Value,

    /// Human-readable outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl AuditEntry {
    /// Create an entry stamped now
    pub fn new<T: Serialize>(action: AuditAction, user_id: OwnerId, options: &T) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            user_id,
            options: serde_json::to_value(options).unwrap_or(serde_json::Value::Null),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.action,
            self.user_id.short()
        );

        if let Some(summary) = &self.summary {
            output.push_str(&format!("\n  {}", summary));
        }

        output
    }
}
