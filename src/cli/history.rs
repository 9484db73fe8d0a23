//! Audit history command

use crate::error::InvoicingResult;
use crate::storage::JsonFileBackend;

/// Print the most recent audit entries, newest last
pub fn handle_history_command(backend: &JsonFileBackend, limit: usize) -> InvoicingResult<()> {
    let log = backend.audit_log();
    let entries = log.read_recent(limit)?;

    if entries.is_empty() {
        println!("No audit history yet.");
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.format_human_readable());
    }

    let total = log.entry_count()?;
    if total > entries.len() {
        println!();
        println!("Showing {} of {} entries (use --limit to see more)", entries.len(), total);
    }
    Ok(())
}
