//! Backup writer
//!
//! Renders a snapshot as an indented document and hands the bytes to a
//! download sink. No backend involvement; failures are local I/O only.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::error::InvoicingResult;
use crate::models::Snapshot;
use crate::storage::file_io::write_atomic;

/// Prefix of every default backup filename
pub const FILENAME_PREFIX: &str = "invoicing-genius-backup";

/// On-disk rendering of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Yaml,
}

impl SnapshotFormat {
    /// Pick the format from a file extension; anything unknown is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => SnapshotFormat::Yaml,
            _ => SnapshotFormat::Json,
        }
    }
}

/// `invoicing-genius-backup-2026-10-16.json`
pub fn default_filename(date: NaiveDate) -> String {
    format!("{}-{}.json", FILENAME_PREFIX, date.format("%Y-%m-%d"))
}

/// Serialize a snapshot in the given format
pub fn render(snapshot: &Snapshot, format: SnapshotFormat) -> InvoicingResult<Vec<u8>> {
    match format {
        SnapshotFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(snapshot)?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        SnapshotFormat::Yaml => Ok(serde_yaml::to_string(snapshot)?.into_bytes()),
    }
}

/// Receives a finished backup file
pub trait DownloadSink {
    fn deliver(&self, bytes: &[u8], filename: &str) -> InvoicingResult<()>;
}

/// Saves downloads into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

impl DownloadSink for DirectorySink {
    fn deliver(&self, bytes: &[u8], filename: &str) -> InvoicingResult<()> {
        write_atomic(self.path_for(filename), bytes)
    }
}

/// Writes snapshots through a sink
pub struct BackupWriter<S> {
    sink: S,
}

impl<S: DownloadSink> BackupWriter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Deliver `snapshot` under `filename`, or today's default name
    ///
    /// Returns the filename used.
    pub fn download(&self, snapshot: &Snapshot, filename: Option<&str>) -> InvoicingResult<String> {
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| default_filename(Utc::now().date_naive()));

        let bytes = render(snapshot, SnapshotFormat::from_path(Path::new(&filename)))?;
        self.sink.deliver(&bytes, &filename)?;

        info!(%filename, bytes = bytes.len(), "backup file written");
        Ok(filename)
    }
}
