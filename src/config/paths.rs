//! Path management for Invoicing Genius
//!
//! ## Path Resolution Order
//!
//! 1. `INVOICING_GENIUS_DATA_DIR` environment variable (if set)
//! 2. The platform data directory from `directories`
//!    (`~/.local/share/invoicing-genius` on Linux,
//!    `~/Library/Application Support/com.InvoicingGenius.invoicing-genius` on macOS,
//!    `%APPDATA%\InvoicingGenius\invoicing-genius\data` on Windows)

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::InvoicingError;
use crate::models::Collection;

/// Environment variable overriding the base directory
pub const DATA_DIR_ENV: &str = "INVOICING_GENIUS_DATA_DIR";

/// Manages all paths used by Invoicing Genius
#[derive(Debug, Clone)]
pub struct InvoicingPaths {
    base_dir: PathBuf,
}

impl InvoicingPaths {
    /// Resolve the base directory from the environment or the platform
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, InvoicingError> {
        let base_dir = match std::env::var(DATA_DIR_ENV) {
            Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
            _ => ProjectDirs::from("com", "InvoicingGenius", "invoicing-genius")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    InvoicingError::Config("Could not determine a home directory".into())
                })?,
        };

        Ok(Self { base_dir })
    }

    /// Create paths rooted at a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Local offline store, one JSON file per collection
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Default target for downloaded backup files
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// Append-only ledger of every backup taken
    pub fn backups_ledger(&self) -> PathBuf {
        self.base_dir.join("backups.jsonl")
    }

    pub fn collection_file(&self, collection: Collection) -> PathBuf {
        self.data_dir().join(format!("{}.json", collection.as_str()))
    }

    /// Ensure base, data and backup directories exist
    pub fn ensure_directories(&self) -> Result<(), InvoicingError> {
        for dir in [self.base_dir.clone(), self.data_dir(), self.backup_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                InvoicingError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Check if a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = InvoicingPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
        assert_eq!(paths.backups_ledger(), temp_dir.path().join("backups.jsonl"));
    }

    #[test]
    fn test_collection_file() {
        let temp_dir = TempDir::new().unwrap();
        let paths = InvoicingPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(
            paths.collection_file(Collection::InvoiceProducts),
            temp_dir.path().join("data").join("invoice_products.json")
        );
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = InvoicingPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();

        assert!(paths.data_dir().exists());
        assert!(paths.backup_dir().exists());
        assert!(!paths.is_initialized());
    }
}
