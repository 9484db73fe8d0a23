//! Configuration module for Invoicing Genius
//!
//! - Platform path resolution for config, local data, backups and logs
//! - User settings persistence (default owner, device name, backup defaults)

pub mod paths;
pub mod settings;

pub use paths::InvoicingPaths;
pub use settings::{BackupDefaults, Settings};
