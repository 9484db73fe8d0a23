//! Sync CLI commands
//!
//! Pushes a file of queued offline changes and optionally settles every
//! conflict the same way.

use std::fs;
use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use crate::config::Settings;
use crate::error::{InvoicingError, InvoicingResult};
use crate::storage::JsonFileBackend;
use crate::sync::{PendingChange, Reconciler, Resolution};

use super::resolve_owner;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResolveArg {
    /// Overwrite the server copy with the local change
    KeepLocal,
    /// Discard the local change
    KeepServer,
}

impl From<ResolveArg> for Resolution {
    fn from(arg: ResolveArg) -> Self {
        match arg {
            ResolveArg::KeepLocal => Resolution::KeepLocal,
            ResolveArg::KeepServer => Resolution::KeepServer,
        }
    }
}

/// Sync subcommands
#[derive(Subcommand)]
pub enum SyncCommands {
    /// Push queued changes from a JSON file
    Push {
        /// JSON array of pending changes
        changes: PathBuf,

        #[arg(long)]
        owner: Option<String>,

        /// Settle every conflict this way instead of reporting it
        #[arg(long, value_enum)]
        resolve: Option<ResolveArg>,
    },
}

pub fn handle_sync_command(
    backend: &JsonFileBackend,
    settings: &Settings,
    cmd: SyncCommands,
) -> InvoicingResult<()> {
    match cmd {
        SyncCommands::Push {
            changes,
            owner,
            resolve,
        } => {
            let owner = resolve_owner(owner.as_deref(), settings)?;
            let contents = fs::read_to_string(&changes).map_err(|e| {
                InvoicingError::Io(format!("Failed to read {}: {}", changes.display(), e))
            })?;
            let pending: Vec<PendingChange> = serde_json::from_str(&contents)?;

            let reconciler = Reconciler::new(backend);
            let outcome = reconciler.reconcile(owner, pending)?;
            println!("Applied {} change(s).", outcome.applied);

            if outcome.is_clean() {
                return Ok(());
            }

            println!("{} conflict(s):", outcome.conflicts.len());
            for conflict in &outcome.conflicts {
                println!("  - {}", conflict.describe());
            }

            match resolve {
                Some(arg) => {
                    for conflict in &outcome.conflicts {
                        reconciler.resolve(owner, conflict, arg.into())?;
                    }
                    println!("Resolved all conflicts ({:?}).", Resolution::from(arg));
                }
                None => {
                    println!();
                    println!("Run again with --resolve keep-local or --resolve keep-server.");
                }
            }
        }
    }
    Ok(())
}
