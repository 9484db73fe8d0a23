//! Custom error types for Invoicing Genius
//!
//! This module defines the error hierarchy for the backup, restore and sync
//! engine using thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for Invoicing Genius operations
#[derive(Error, Debug)]
pub enum InvoicingError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Snapshot shape validation failed; carries every issue found
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Backend read failure while building a backup
    #[error("Failed to fetch {collection}: {message}")]
    Fetch {
        collection: String,
        message: String,
    },

    /// Backend write failure during restore or sync
    #[error("Failed to write {collection}: {message}")]
    Write {
        collection: String,
        message: String,
    },

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A sync change could not be applied because the server moved on
    #[error("Sync conflict: {0}")]
    Conflict(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl InvoicingError {
    /// Create a validation error from a single message
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// Create a fetch error for a collection
    pub fn fetch(collection: impl ToString, message: impl Into<String>) -> Self {
        Self::Fetch {
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    /// Create a write error for a collection
    pub fn write(collection: impl ToString, message: impl Into<String>) -> Self {
        Self::Write {
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a backend write error
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

impl From<std::io::Error> for InvoicingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for InvoicingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for InvoicingError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for Invoicing Genius operations
pub type InvoicingResult<T> = Result<T, InvoicingError>;
