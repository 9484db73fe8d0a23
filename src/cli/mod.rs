//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup, restore and sync
//! engines.

pub mod backup;
pub mod history;
pub mod sync;

pub use backup::{handle_backup_command, BackupCommands};
pub use history::handle_history_command;
pub use sync::{handle_sync_command, SyncCommands};

use crate::config::Settings;
use crate::error::{InvoicingError, InvoicingResult};
use crate::models::OwnerId;

/// Owner from `--owner`, else the configured default
pub fn resolve_owner(arg: Option<&str>, settings: &Settings) -> InvoicingResult<OwnerId> {
    match arg {
        Some(raw) => raw
            .parse()
            .map_err(|e| InvoicingError::Config(format!("Invalid owner '{}': {}", raw, e))),
        None => settings.default_owner.ok_or_else(|| {
            InvoicingError::Config(
                "No owner given. Pass --owner or run 'invoicing init' first.".to_string(),
            )
        }),
    }
}
