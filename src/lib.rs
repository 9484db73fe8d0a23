//! Invoicing Genius - backup, restore and offline sync for invoicing data
//!
//! Captures one owner's invoices, estimates, clients, products, recurring
//! schedules, profile and settings as a portable snapshot, and replays
//! snapshots back into a backend with ID remapping.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Collections, records, snapshots and IDs
//! - `storage`: The `Backend` trait with JSON-file and in-memory stores
//! - `audit`: Audit logging system
//! - `backup`: Snapshot building, writing, validation and restore
//! - `sync`: Offline change reconciliation
//! - `cli`: Command handlers for the `invoicing` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use invoicing_genius::config::{InvoicingPaths, Settings};
//! use invoicing_genius::storage::JsonFileBackend;
//!
//! let paths = InvoicingPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let backend = JsonFileBackend::open(paths)?;
//! ```

pub mod audit;
pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod sync;

pub use error::{InvoicingError, InvoicingResult};
