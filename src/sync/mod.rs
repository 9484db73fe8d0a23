//! Offline sync: push queued local changes and settle conflicts

mod reconcile;

pub use reconcile::{
    ChangeKind, PendingChange, Reconciler, Resolution, SyncConflict, SyncOutcome,
};
