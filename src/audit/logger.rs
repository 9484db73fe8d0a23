//! Append-only JSONL log
//!
//! Each entry is written as a single JSON line and flushed immediately. The
//! same log type backs both the audit log and the backups ledger.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{InvoicingError, InvoicingResult};

use super::entry::AuditEntry;

/// Append-only log of `T` stored as line-delimited JSON
pub struct JsonlLog<T> {
    log_path: PathBuf,
    _entry: PhantomData<fn() -> T>,
}

/// The restore/backup audit log
pub type AuditLogger = JsonlLog<AuditEntry>;

impl<T> JsonlLog<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            _entry: PhantomData,
        }
    }

    fn open_for_append(&self) -> InvoicingResult<File> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                InvoicingError::Io(format!("Failed to create log directory: {}", e))
            })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                InvoicingError::Io(format!(
                    "Failed to open {}: {}",
                    self.log_path.display(),
                    e
                ))
            })
    }

    /// Append one entry
    pub fn append(&self, entry: &T) -> InvoicingResult<()> {
        self.append_batch(std::slice::from_ref(entry))
    }

    /// Append several entries, flushing once at the end
    pub fn append_batch(&self, entries: &[T]) -> InvoicingResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut file = self.open_for_append()?;

        for entry in entries {
            let json = serde_json::to_string(entry)
                .map_err(|e| InvoicingError::Json(format!("Failed to serialize log entry: {}", e)))?;

            writeln!(file, "{}", json)
                .map_err(|e| InvoicingError::Io(format!("Failed to write log entry: {}", e)))?;
        }

        file.flush()
            .map_err(|e| InvoicingError::Io(format!("Failed to flush log: {}", e)))?;

        Ok(())
    }

    /// Read every entry, oldest first
    pub fn read_all(&self) -> InvoicingResult<Vec<T>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| InvoicingError::Io(format!("Failed to open log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                InvoicingError::Io(format!("Failed to read log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: T = serde_json::from_str(&line).map_err(|e| {
                InvoicingError::Json(format!(
                    "Failed to parse log entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read the most recent `count` entries, oldest first
    pub fn read_recent(&self, count: usize) -> InvoicingResult<Vec<T>> {
        let mut all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries.split_off(start))
    }

    pub fn entry_count(&self) -> InvoicingResult<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}
