//! File I/O utilities with atomic writes
//!
//! Everything the crate writes to disk (collection files, downloaded
//! backups) goes through `write_atomic`: temp file in the same directory,
//! fsync, rename.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::InvoicingError;

/// Read JSON from a file, returning a default value if the file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, InvoicingError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| InvoicingError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| InvoicingError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Serialize as indented JSON and write atomically
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), InvoicingError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let bytes = serde_json::to_vec_pretty(data)
        .map_err(|e| InvoicingError::Storage(format!("Failed to serialize data: {}", e)))?;
    write_atomic(path, &bytes)
}

/// Write bytes so the target is either fully replaced or left untouched
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), InvoicingError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            InvoicingError::Io(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path);

    let mut file = File::create(&temp_path)
        .map_err(|e| InvoicingError::Io(format!("Failed to create temp file: {}", e)))?;

    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            InvoicingError::Io(format!("Failed to write {}: {}", path.display(), e))
        })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        InvoicingError::Io(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// `invoices.json` -> `invoices.json.tmp`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_read_nonexistent_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let data: TestData = read_json(temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(data, TestData::default());
    }

    #[test]
    fn test_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clients.json");

        let data = TestData {
            name: "Acme".to_string(),
            value: 42,
        };

        write_json_atomic(&path, &data).unwrap();
        let loaded: TestData = read_json(&path).unwrap();
        assert_eq!(data, loaded);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n  \"name\""));
    }

    #[test]
    fn test_atomic_write_no_temp_file_left() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.yaml");

        write_atomic(&path, b"version: '1.0'\n").unwrap();

        assert!(path.exists());
        assert!(!temp_dir.path().join("backup.yaml.tmp").exists());
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("test.json");

        write_json_atomic(&path, &TestData::default()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        assert_eq!(
            temp_path_for(Path::new("/tmp/a/invoices.json")),
            PathBuf::from("/tmp/a/invoices.json.tmp")
        );
    }
}
