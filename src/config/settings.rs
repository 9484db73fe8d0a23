//! User settings for Invoicing Genius
//!
//! Manages the default owner, the device descriptor stamped into backups and
//! the default backup/restore choices.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::InvoicingPaths;
use crate::error::InvoicingError;
use crate::models::{BackupType, Collection, OwnerId};

/// Defaults applied to `backup create` and `backup restore`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDefaults {
    /// Top-level collections left out unless asked for
    #[serde(default)]
    pub excluded: Vec<Collection>,

    #[serde(default)]
    pub backup_type: BackupType,

    /// Take an automatic backup before an overwriting restore
    #[serde(default = "default_true")]
    pub backup_before_overwrite: bool,
}

impl Default for BackupDefaults {
    fn default() -> Self {
        Self {
            excluded: Vec::new(),
            backup_type: BackupType::Manual,
            backup_before_overwrite: true,
        }
    }
}

/// User settings for Invoicing Genius
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Owner used when `--owner` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_owner: Option<OwnerId>,

    /// Device name stamped into snapshot metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    #[serde(default)]
    pub backup_defaults: BackupDefaults,

    /// Where downloaded backups go; defaults to the backups directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            default_owner: None,
            device_name: None,
            backup_defaults: BackupDefaults::default(),
            download_dir: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if no file exists yet
    pub fn load_or_create(paths: &InvoicingPaths) -> Result<Self, InvoicingError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                InvoicingError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                InvoicingError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &InvoicingPaths) -> Result<(), InvoicingError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            InvoicingError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| InvoicingError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Device descriptor for snapshot metadata
    pub fn device_info(&self) -> String {
        match &self.device_name {
            Some(name) => format!("{} ({}-{})", name, std::env::consts::OS, std::env::consts::ARCH),
            None => format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }

    pub fn download_dir(&self, paths: &InvoicingPaths) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| paths.backup_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.default_owner.is_none());
        assert_eq!(settings.backup_defaults.backup_type, BackupType::Manual);
        assert!(settings.backup_defaults.backup_before_overwrite);
        assert!(settings.backup_defaults.excluded.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = InvoicingPaths::with_base_dir(temp_dir.path().to_path_buf());

        let owner = OwnerId::new();
        let mut settings = Settings::default();
        settings.default_owner = Some(owner);
        settings.backup_defaults.excluded = vec![Collection::Settings];

        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.default_owner, Some(owner));
        assert_eq!(loaded.backup_defaults.excluded, vec![Collection::Settings]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.schema_version, 1);
        assert!(settings.backup_defaults.backup_before_overwrite);
    }

    #[test]
    fn test_download_dir_falls_back_to_backups() {
        let temp_dir = TempDir::new().unwrap();
        let paths = InvoicingPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = Settings::default();
        assert_eq!(settings.download_dir(&paths), paths.backup_dir());
    }

    #[test]
    fn test_device_info_includes_name() {
        let settings = Settings {
            device_name: Some("Front desk".into()),
            ..Settings::default()
        };
        assert!(settings.device_info().starts_with("Front desk ("));
    }
}
