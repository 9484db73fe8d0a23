//! Backup CLI commands
//!
//! Create, inspect and restore snapshots from the command line.

use std::path::PathBuf;

use chrono::Utc;
use clap::Subcommand;
use serde_json::{json, Value};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::audit::{AuditAction, AuditEntry};
use crate::backup::{
    coverage_summary, read_document, validate_document, BackupBuilder, BackupOptions, BackupWriter,
    DirectorySink, IncludeFlags, RestoreEngine, RestoreOptions, FILENAME_PREFIX,
};
use crate::config::Settings;
use crate::error::{InvoicingError, InvoicingResult};
use crate::models::{BackupId, BackupRecord, BackupType, Collection, OwnerId, Snapshot};
use crate::storage::{Backend, Filter, JsonFileBackend, MemoryBackend};

use super::resolve_owner;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a backup and save it to the download directory
    Create {
        /// Owner to back up (defaults to the configured owner)
        #[arg(long)]
        owner: Option<String>,

        /// Leave a collection out (repeatable)
        #[arg(long, value_name = "COLLECTION")]
        exclude: Vec<Collection>,

        /// Label shown in listings
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Mark the backup as automatic
        #[arg(long)]
        automatic: bool,

        /// Output filename (.json or .yaml)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List backups recorded for an owner
    List {
        #[arg(long)]
        owner: Option<String>,
    },

    /// Show what a backup contains
    Info {
        /// Backup file, ledger ID, or 'latest'
        backup: String,

        #[arg(long)]
        owner: Option<String>,
    },

    /// Check a backup file without restoring it
    Validate {
        /// Backup file, ledger ID, or 'latest'
        backup: String,

        #[arg(long)]
        owner: Option<String>,
    },

    /// Restore a backup
    Restore {
        /// Backup file, ledger ID, or 'latest'
        backup: String,

        /// Owner to restore into (defaults to the configured owner)
        #[arg(long)]
        owner: Option<String>,

        /// Replace existing data instead of merging
        #[arg(long)]
        overwrite: bool,

        /// Leave a collection out (repeatable)
        #[arg(long, value_name = "COLLECTION")]
        exclude: Vec<Collection>,

        /// Run against a scratch copy and report what would change
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Where a backup to inspect or restore comes from
enum BackupSource {
    File(PathBuf),
    Ledger(Box<BackupRecord>),
}

impl BackupSource {
    fn describe(&self) -> String {
        match self {
            BackupSource::File(path) => path.display().to_string(),
            BackupSource::Ledger(record) => format!("ledger {} ({})", record.id.short(), record.display_name()),
        }
    }

    fn document(&self) -> InvoicingResult<Value> {
        match self {
            BackupSource::File(path) => read_document(path),
            BackupSource::Ledger(record) => Ok(serde_json::to_value(&record.backup_data)?),
        }
    }
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    backup_type: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Records")]
    records: usize,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Collection")]
    collection: String,
    #[tabled(rename = "Records")]
    records: String,
}

/// Handle a backup command
pub fn handle_backup_command(
    backend: &JsonFileBackend,
    settings: &Settings,
    cmd: BackupCommands,
) -> InvoicingResult<()> {
    match cmd {
        BackupCommands::Create {
            owner,
            exclude,
            name,
            description,
            automatic,
            output,
        } => {
            let owner = resolve_owner(owner.as_deref(), settings)?;
            let mut excluded = settings.backup_defaults.excluded.clone();
            excluded.extend(exclude);

            let options = BackupOptions {
                include: IncludeFlags::excluding(&excluded),
                backup_type: if automatic {
                    BackupType::Automatic
                } else {
                    settings.backup_defaults.backup_type
                },
                backup_name: name,
                backup_description: description,
                app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                device_info: Some(settings.device_info()),
            };

            println!("Creating backup...");
            let (snapshot, path) = create_and_save(backend, settings, owner, &options, output.as_deref())?;

            println!("Backup created: {} records", snapshot.record_count());
            println!("Location: {}", path.display());
        }

        BackupCommands::List { owner } => {
            let owner = resolve_owner(owner.as_deref(), settings)?;
            let backups = backend.list_backups(owner)?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: invoicing backup create");
                return Ok(());
            }

            let now = Utc::now();
            let rows: Vec<BackupRow> = backups
                .iter()
                .map(|b| BackupRow {
                    id: b.id.to_string(),
                    name: b.display_name(),
                    backup_type: b.backup_type.to_string(),
                    created: b.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    age: format_duration(now.signed_duration_since(b.created_at)),
                    records: b.record_count,
                })
                .collect();

            println!("{}", Table::new(rows).with(Style::rounded()));
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Info { backup, owner } => {
            let source = resolve_source(backend, settings, owner.as_deref(), &backup)?;
            let snapshot = validate_document(&source.document()?)?;
            print_snapshot_details(&source, &snapshot);
        }

        BackupCommands::Validate { backup, owner } => {
            let source = resolve_source(backend, settings, owner.as_deref(), &backup)?;
            match validate_document(&source.document()?) {
                Ok(snapshot) => {
                    println!("Valid: {}", coverage_summary(&snapshot));
                }
                Err(InvoicingError::Validation(issues)) => {
                    println!("Invalid backup: {}", source.describe());
                    for issue in &issues {
                        println!("  - {}", issue);
                    }
                    return Err(InvoicingError::Validation(issues));
                }
                Err(e) => return Err(e),
            }
        }

        BackupCommands::Restore {
            backup,
            owner,
            overwrite,
            exclude,
            dry_run,
            force,
        } => {
            let owner = resolve_owner(owner.as_deref(), settings)?;
            let source = resolve_source(backend, settings, Some(&owner.to_string()), &backup)?;
            let document = source.document()?;

            // Reject bad files before asking for confirmation
            let snapshot = validate_document(&document)?;
            print_snapshot_details(&source, &snapshot);

            let options = RestoreOptions {
                include: IncludeFlags::excluding(&exclude),
                overwrite_existing: overwrite,
            };

            if dry_run {
                let scratch = scratch_copy(backend)?;
                let report = RestoreEngine::new(&scratch).restore_document(&document, owner, &options)?;
                println!("Dry run, nothing written.");
                println!("{}", report.summary());
                return Ok(());
            }

            if !force {
                if overwrite {
                    println!("WARNING: This will replace the owner's current data!");
                } else {
                    println!("This will merge the backup into the owner's current data.");
                }
                println!("To proceed, run again with --force flag:");
                println!("  invoicing backup restore {} --force", backup);
                return Ok(());
            }

            if overwrite && settings.backup_defaults.backup_before_overwrite {
                println!("Creating backup of current data before restore...");
                let pre_restore = BackupOptions {
                    backup_type: BackupType::Automatic,
                    backup_name: Some("Before restore".to_string()),
                    app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                    device_info: Some(settings.device_info()),
                    ..BackupOptions::default()
                };
                let filename = format!(
                    "{}-pre-restore-{}.json",
                    FILENAME_PREFIX,
                    Utc::now().format("%Y%m%d-%H%M%S")
                );
                let (_, path) = create_and_save(backend, settings, owner, &pre_restore, Some(&filename))?;
                println!("Pre-restore backup saved: {}", path.display());
                println!();
            }

            println!("Restoring from backup...");
            let report = RestoreEngine::new(backend).restore_document(&document, owner, &options)?;

            println!("Restore complete!");
            println!("{}", report.summary());
            if report.total_orphaned() > 0 {
                println!(
                    "\nNote: {} line item(s) referenced invoices or estimates that were not restored.",
                    report.total_orphaned()
                );
            }
        }
    }

    Ok(())
}

/// Build, save and audit one backup
fn create_and_save(
    backend: &JsonFileBackend,
    settings: &Settings,
    owner: OwnerId,
    options: &BackupOptions,
    filename: Option<&str>,
) -> InvoicingResult<(Snapshot, PathBuf)> {
    let snapshot = BackupBuilder::new(backend).build(owner, options)?;

    let writer = BackupWriter::new(DirectorySink::new(settings.download_dir(backend.paths())));
    let filename = writer.download(&snapshot, filename)?;

    let audit_options = json!({
        "include": options.include,
        "backup_type": options.backup_type,
        "filename": filename,
    });
    let entry = AuditEntry::new(AuditAction::Backup, owner, &audit_options).with_summary(format!(
        "{} records in {}",
        snapshot.record_count(),
        filename
    ));
    backend.append_audit(&entry)?;

    let path = writer.sink().path_for(&filename);
    Ok((snapshot, path))
}

/// In-memory copy of every collection, for dry runs
fn scratch_copy(backend: &JsonFileBackend) -> InvoicingResult<MemoryBackend> {
    let scratch = MemoryBackend::new();
    for collection in Collection::all() {
        scratch.seed(*collection, backend.select(*collection, &Filter::All)?)?;
    }
    Ok(scratch)
}

fn print_snapshot_details(source: &BackupSource, snapshot: &Snapshot) {
    println!("Backup Details");
    println!("==============");
    println!("Source: {}", source.describe());
    if let BackupSource::File(path) = source {
        if let Ok(meta) = std::fs::metadata(path) {
            println!("Size: {}", format_size(meta.len()));
        }
    }
    println!("Created: {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Format version: {}", snapshot.version);
    println!("Owner: {}", snapshot.user_id.short());
    println!("Type: {}", snapshot.metadata.backup_type);
    if let Some(name) = &snapshot.metadata.backup_name {
        println!("Name: {}", name);
    }
    if let Some(description) = &snapshot.metadata.backup_description {
        println!("Description: {}", description);
    }
    if let Some(version) = &snapshot.metadata.app_version {
        println!("App version: {}", version);
    }
    if let Some(device) = &snapshot.metadata.device_info {
        println!("Device: {}", device);
    }
    println!();

    let rows: Vec<CountRow> = Collection::all()
        .iter()
        .map(|c| CountRow {
            collection: c.to_string(),
            records: if snapshot.contains(*c) {
                snapshot.records(*c).len().to_string()
            } else {
                "-".to_string()
            },
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("Status: {}", coverage_summary(snapshot));
    println!();
}

/// Resolve a backup argument to a file or ledger entry
fn resolve_source(
    backend: &JsonFileBackend,
    settings: &Settings,
    owner: Option<&str>,
    backup: &str,
) -> InvoicingResult<BackupSource> {
    if backup.eq_ignore_ascii_case("latest") {
        let owner = resolve_owner(owner, settings)?;
        return backend
            .list_backups(owner)?
            .into_iter()
            .next()
            .map(|b| BackupSource::Ledger(Box::new(b)))
            .ok_or_else(|| InvoicingError::backup_not_found("latest"));
    }

    let path = PathBuf::from(backup);
    if path.exists() {
        return Ok(BackupSource::File(path));
    }

    let in_downloads = settings.download_dir(backend.paths()).join(backup);
    if in_downloads.exists() {
        return Ok(BackupSource::File(in_downloads));
    }

    if let Ok(id) = backup.parse::<BackupId>() {
        let owner = resolve_owner(owner, settings)?;
        if let Some(record) = backend.list_backups(owner)?.into_iter().find(|b| b.id == id) {
            return Ok(BackupSource::Ledger(Box::new(record)));
        }
    }

    Err(InvoicingError::backup_not_found(backup))
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(chrono::Duration::seconds(42)), "42s");
        assert_eq!(format_duration(chrono::Duration::minutes(90)), "1h");
        assert_eq!(format_duration(chrono::Duration::days(3)), "3d");
        assert_eq!(format_duration(chrono::Duration::days(65)), "2mo");
        assert_eq!(format_duration(chrono::Duration::seconds(-5)), "0s");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
