//! Offline change reconciliation
//!
//! Each queued change carries the server `updated_at` the local edit
//! started from. A change is applied only while the server row still has
//! that stamp; otherwise it comes back as a conflict and nothing is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEntry};
use crate::error::{InvoicingError, InvoicingResult};
use crate::models::record::{
    record_id, set_string, string_field, ID_COLUMN, OWNER_COLUMN, UPDATED_AT_COLUMN,
};
use crate::models::{new_record_id, Collection, Link, OwnerId, Ownership, Record};
use crate::storage::{Backend, Filter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Upsert,
    Delete,
}

/// A change made while offline, waiting to be pushed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub collection: Collection,
    pub record_id: String,
    pub kind: ChangeKind,

    /// Full local row; absent for deletes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<Record>,

    /// Server `updated_at` the edit started from; absent for new rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_updated_at: Option<String>,
}

impl PendingChange {
    /// Queue an upsert; a record without an ID gets one
    pub fn upsert(collection: Collection, mut record: Record, base_updated_at: Option<String>) -> Self {
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = new_record_id();
                set_string(&mut record, ID_COLUMN, id.clone());
                id
            }
        };
        Self {
            collection,
            record_id: id,
            kind: ChangeKind::Upsert,
            local: Some(record),
            base_updated_at,
        }
    }

    pub fn delete(collection: Collection, record_id: impl Into<String>, base_updated_at: Option<String>) -> Self {
        Self {
            collection,
            record_id: record_id.into(),
            kind: ChangeKind::Delete,
            local: None,
            base_updated_at,
        }
    }
}

/// A change the server moved past since the local edit began
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub change: PendingChange,
    pub server: Record,
}

impl SyncConflict {
    pub fn server_updated_at(&self) -> Option<String> {
        string_field(&self.server, UPDATED_AT_COLUMN)
    }

    /// Fields whose local and server values differ, bookkeeping excluded
    pub fn changed_fields(&self) -> Vec<String> {
        let Some(local) = &self.change.local else {
            return Vec::new();
        };
        let mut fields: Vec<String> = local
            .keys()
            .chain(self.server.keys())
            .filter(|k| !matches!(k.as_str(), UPDATED_AT_COLUMN | OWNER_COLUMN))
            .filter(|k| local.get(*k) != self.server.get(*k))
            .cloned()
            .collect();
        fields.sort();
        fields.dedup();
        fields
    }

    /// `field: server -> local` for each differing field
    pub fn describe(&self) -> String {
        let head = format!(
            "{} {} ({})",
            self.change.collection,
            self.change.record_id,
            match self.change.kind {
                ChangeKind::Upsert => "edited",
                ChangeKind::Delete => "deleted",
            }
        );

        let Some(local) = &self.change.local else {
            return format!("{} locally but changed on server", head);
        };

        let diffs: Vec<String> = self
            .changed_fields()
            .iter()
            .map(|field| {
                format!(
                    "{}: {} -> {}",
                    field,
                    format_value(self.server.get(field)),
                    format_value(local.get(field))
                )
            })
            .collect();

        if diffs.is_empty() {
            head
        } else {
            format!("{}: {}", head, diffs.join(", "))
        }
    }
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        None => "(absent)".to_string(),
        Some(Value::String(s)) if s.chars().count() > 40 => {
            let cut: String = s.chars().take(37).collect();
            format!("\"{}...\"", cut)
        }
        Some(Value::Array(items)) => format!("[{} items]", items.len()),
        Some(Value::Object(map)) => format!("{{{} fields}}", map.len()),
        Some(other) => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Changes written (or already in effect)
    pub applied: usize,
    pub conflicts: Vec<SyncConflict>,
}

impl SyncOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepLocal,
    KeepServer,
}

/// Pushes offline changes to a backend
pub struct Reconciler<B> {
    backend: B,
}

impl<B: Backend> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Apply every change that does not conflict
    ///
    /// Conflicts are collected; a backend error stops the run.
    pub fn reconcile(&self, owner: OwnerId, changes: Vec<PendingChange>) -> InvoicingResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();

        for change in changes {
            let server = self.server_row(owner, &change)?;

            match (server, change.kind) {
                (None, ChangeKind::Upsert) => {
                    self.write_local(owner, &change)?;
                    outcome.applied += 1;
                }
                (None, ChangeKind::Delete) => {
                    debug!(collection = %change.collection, id = %change.record_id, "already deleted");
                    outcome.applied += 1;
                }
                (Some(server), _) if unchanged_since(&server, change.base_updated_at.as_deref()) => {
                    self.write_local(owner, &change)?;
                    outcome.applied += 1;
                }
                (Some(server), _) => {
                    warn!(
                        collection = %change.collection,
                        id = %change.record_id,
                        "sync conflict"
                    );
                    outcome.conflicts.push(SyncConflict { change, server });
                }
            }
        }

        info!(
            owner = %owner.short(),
            applied = outcome.applied,
            conflicts = outcome.conflicts.len(),
            "sync reconciled"
        );
        Ok(outcome)
    }

    /// Settle a conflict; keeping the server copy writes no rows
    pub fn resolve(
        &self,
        owner: OwnerId,
        conflict: &SyncConflict,
        resolution: Resolution,
    ) -> InvoicingResult<()> {
        if resolution == Resolution::KeepLocal {
            self.check_incoming(owner, &conflict.change)?;
            self.write_local(owner, &conflict.change)?;
        }

        let options = json!({
            "collection": conflict.change.collection,
            "record_id": conflict.change.record_id,
            "resolution": resolution,
        });
        let entry = AuditEntry::new(AuditAction::SyncResolve, owner, &options)
            .with_summary(conflict.describe());
        self.backend.append_audit(&entry)?;

        info!(
            collection = %conflict.change.collection,
            id = %conflict.change.record_id,
            ?resolution,
            "sync conflict resolved"
        );
        Ok(())
    }

    fn server_row(&self, owner: OwnerId, change: &PendingChange) -> InvoicingResult<Option<Record>> {
        self.check_incoming(owner, change)?;

        let rows = self
            .backend
            .select(change.collection, &Filter::by_id(change.record_id.as_str()))
            .map_err(|e| InvoicingError::fetch(change.collection, e.to_string()))?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let foreign = match change.collection.ownership() {
            Ownership::UserColumn => {
                string_field(&row, OWNER_COLUMN).is_some_and(|o| o != owner.to_string())
            }
            // The incoming check already pinned the ID to the owner
            Ownership::Singleton => false,
            Ownership::Parent(link) => match string_field(&row, link.column) {
                Some(parent) => !self.owns_parent(owner, link, &parent)?,
                None => true,
            },
        };
        if foreign {
            return Err(foreign_row(change));
        }

        Ok(Some(row))
    }

    /// Reject changes that would land outside the owner's rows
    fn check_incoming(&self, owner: OwnerId, change: &PendingChange) -> InvoicingResult<()> {
        match change.collection.ownership() {
            Ownership::Singleton if change.record_id != owner.to_string() => {
                Err(foreign_row(change))
            }
            Ownership::Parent(link) if change.kind == ChangeKind::Upsert => {
                let parent = change
                    .local
                    .as_ref()
                    .and_then(|local| string_field(local, link.column))
                    .ok_or_else(|| {
                        InvoicingError::validation(format!(
                            "upsert of {} {} has no `{}`",
                            change.collection, change.record_id, link.column
                        ))
                    })?;
                if self.owns_parent(owner, link, &parent)? {
                    Ok(())
                } else {
                    Err(InvoicingError::Conflict(format!(
                        "{} {} points at {} {} which the owner does not hold",
                        change.collection, change.record_id, link.target, parent
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    fn owns_parent(&self, owner: OwnerId, link: Link, parent_id: &str) -> InvoicingResult<bool> {
        let owner = owner.to_string();
        let parents = self
            .backend
            .select(link.target, &Filter::by_id(parent_id))
            .map_err(|e| InvoicingError::fetch(link.target, e.to_string()))?;
        Ok(parents
            .iter()
            .any(|p| string_field(p, OWNER_COLUMN).as_deref() == Some(owner.as_str())))
    }

    fn write_local(&self, owner: OwnerId, change: &PendingChange) -> InvoicingResult<()> {
        let collection = change.collection;
        match (change.kind, &change.local) {
            (ChangeKind::Upsert, Some(local)) => {
                let mut record = local.clone();
                set_string(&mut record, ID_COLUMN, change.record_id.as_str());
                if collection.ownership() == Ownership::UserColumn {
                    set_string(&mut record, OWNER_COLUMN, owner.to_string());
                }
                set_string(&mut record, UPDATED_AT_COLUMN, Utc::now().to_rfc3339());
                self.backend
                    .upsert(collection, record)
                    .map_err(|e| InvoicingError::write(collection, e.to_string()))?;
            }
            (ChangeKind::Upsert, None) => {
                return Err(InvoicingError::validation(format!(
                    "upsert of {} {} carries no record",
                    collection, change.record_id
                )));
            }
            (ChangeKind::Delete, _) => {
                for child in collection.children() {
                    if let Some(link) = child.parent_link() {
                        self.backend
                            .delete(child, &Filter::eq(link.column, change.record_id.as_str()))
                            .map_err(|e| InvoicingError::write(child, e.to_string()))?;
                    }
                }
                self.backend
                    .delete(collection, &Filter::by_id(change.record_id.as_str()))
                    .map_err(|e| InvoicingError::write(collection, e.to_string()))?;
            }
        }
        Ok(())
    }
}

fn foreign_row(change: &PendingChange) -> InvoicingError {
    InvoicingError::Conflict(format!(
        "{} {} belongs to another owner",
        change.collection, change.record_id
    ))
}

/// True when the server row still carries the stamp the edit started from
fn unchanged_since(server: &Record, base: Option<&str>) -> bool {
    match (string_field(server, UPDATED_AT_COLUMN), base) {
        (None, None) => true,
        (Some(current), Some(base)) => same_instant(&current, base),
        _ => false,
    }
}

fn same_instant(a: &str, b: &str) -> bool {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::from_value;
    use crate::storage::MemoryBackend;

    const STAMP: &str = "2026-10-01T08:00:00Z";

    fn setup() -> (MemoryBackend, OwnerId) {
        let owner = OwnerId::new();
        let backend = MemoryBackend::new();
        backend
            .seed(
                Collection::Clients,
                vec![from_value(json!({
                    "id": "cl-1",
                    "user_id": owner.to_string(),
                    "name": "Acme",
                    "updated_at": STAMP
                }))],
            )
            .unwrap();
        (backend, owner)
    }

    fn edited_client(name: &str) -> Record {
        from_value(json!({"id": "cl-1", "name": name}))
    }

    #[test]
    fn test_new_record_is_inserted() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::Clients,
            from_value(json!({"name": "Globex"})),
            None,
        );
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        assert_eq!(outcome.applied, 1);
        assert!(outcome.is_clean());
        let rows = backend.rows(Collection::Clients);
        assert_eq!(rows.len(), 2);
        let globex = rows.iter().find(|r| r["name"] == "Globex").unwrap();
        assert_eq!(globex["user_id"], json!(owner.to_string()));
        assert!(globex.contains_key(UPDATED_AT_COLUMN));
    }

    #[test]
    fn test_unchanged_server_row_takes_local_edit() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::Clients,
            edited_client("Acme Corp"),
            Some("2026-10-01T08:00:00+00:00".into()),
        );
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(backend.rows(Collection::Clients)[0]["name"], "Acme Corp");
    }

    #[test]
    fn test_server_moved_on_yields_conflict_without_write() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::Clients,
            edited_client("Acme Corp"),
            Some("2026-09-01T08:00:00Z".into()),
        );
        let before = backend.stats().writes();
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(backend.stats().writes(), before);
        assert_eq!(backend.rows(Collection::Clients)[0]["name"], "Acme");

        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.changed_fields(), vec!["name".to_string()]);
        assert_eq!(conflict.server_updated_at().as_deref(), Some(STAMP));
        assert!(conflict.describe().contains("name: \"Acme\" -> \"Acme Corp\""));
    }

    #[test]
    fn test_delete_of_missing_row_counts_as_applied() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::delete(Collection::Clients, "cl-gone", Some(STAMP.into()));
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(backend.stats().deletes, 0);
    }

    #[test]
    fn test_delete_cascades_to_line_items() {
        let owner = OwnerId::new();
        let backend = MemoryBackend::new();
        backend
            .seed(
                Collection::Invoices,
                vec![from_value(json!({"id": "inv-1", "user_id": owner.to_string()}))],
            )
            .unwrap();
        backend
            .seed(
                Collection::InvoiceProducts,
                vec![from_value(json!({"id": "ip-1", "invoice_id": "inv-1"}))],
            )
            .unwrap();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::delete(Collection::Invoices, "inv-1", None);
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        assert_eq!(outcome.applied, 1);
        assert!(backend.rows(Collection::Invoices).is_empty());
        assert!(backend.rows(Collection::InvoiceProducts).is_empty());
    }

    #[test]
    fn test_foreign_row_is_refused() {
        let (backend, _) = setup();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(Collection::Clients, edited_client("Mine now"), Some(STAMP.into()));
        let err = reconciler.reconcile(OwnerId::new(), vec![change]).unwrap_err();

        assert!(matches!(err, InvoicingError::Conflict(_)));
    }

    fn seed_foreign_line_item(backend: &MemoryBackend, other: OwnerId) {
        backend
            .seed(
                Collection::Invoices,
                vec![from_value(json!({"id": "inv-a", "user_id": other.to_string()}))],
            )
            .unwrap();
        backend
            .seed(
                Collection::InvoiceProducts,
                vec![from_value(json!({"id": "ip-a", "invoice_id": "inv-a", "price": 100}))],
            )
            .unwrap();
    }

    fn line_item_price(backend: &MemoryBackend) -> Value {
        backend
            .rows(Collection::InvoiceProducts)
            .iter()
            .find(|r| r["id"] == "ip-a")
            .map(|r| r["price"].clone())
            .unwrap()
    }

    #[test]
    fn test_line_item_under_foreign_invoice_is_refused() {
        let (backend, owner) = setup();
        seed_foreign_line_item(&backend, OwnerId::new());
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::InvoiceProducts,
            from_value(json!({"id": "ip-a", "invoice_id": "inv-a", "price": 0})),
            None,
        );
        let err = reconciler.reconcile(owner, vec![change]).unwrap_err();

        assert!(matches!(err, InvoicingError::Conflict(_)));
        assert_eq!(line_item_price(&backend), json!(100));
        assert_eq!(backend.stats().upserts, 0);
    }

    #[test]
    fn test_foreign_line_item_cannot_be_moved_to_own_invoice() {
        let (backend, owner) = setup();
        seed_foreign_line_item(&backend, OwnerId::new());
        backend
            .seed(
                Collection::Invoices,
                vec![from_value(json!({"id": "inv-b", "user_id": owner.to_string()}))],
            )
            .unwrap();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::InvoiceProducts,
            from_value(json!({"id": "ip-a", "invoice_id": "inv-b", "price": 0})),
            None,
        );
        let err = reconciler.reconcile(owner, vec![change]).unwrap_err();

        assert!(matches!(err, InvoicingError::Conflict(_)));
        assert_eq!(line_item_price(&backend), json!(100));

        let delete = PendingChange::delete(Collection::InvoiceProducts, "ip-a", None);
        assert!(reconciler.reconcile(owner, vec![delete]).is_err());
        assert_eq!(backend.rows(Collection::InvoiceProducts).len(), 1);
    }

    #[test]
    fn test_line_item_under_own_invoice_is_applied() {
        let (backend, owner) = setup();
        backend
            .seed(
                Collection::Invoices,
                vec![from_value(json!({"id": "inv-b", "user_id": owner.to_string()}))],
            )
            .unwrap();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::InvoiceProducts,
            from_value(json!({"invoice_id": "inv-b", "price": 40})),
            None,
        );
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        assert_eq!(outcome.applied, 1);
        assert_eq!(backend.rows(Collection::InvoiceProducts).len(), 1);
    }

    #[test]
    fn test_line_item_without_parent_is_rejected() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);

        let change = PendingChange::upsert(
            Collection::InvoicePayments,
            from_value(json!({"id": "pay-1", "amount": 10})),
            None,
        );
        let err = reconciler.reconcile(owner, vec![change]).unwrap_err();

        assert!(err.is_validation());
        assert!(backend.rows(Collection::InvoicePayments).is_empty());
    }

    #[test]
    fn test_singleton_for_another_owner_is_refused_even_when_absent() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);
        let stranger = OwnerId::new().to_string();

        let change = PendingChange::upsert(
            Collection::Profile,
            from_value(json!({"id": stranger, "company_name": "Not mine"})),
            None,
        );
        let err = reconciler.reconcile(owner, vec![change]).unwrap_err();

        assert!(matches!(err, InvoicingError::Conflict(_)));
        assert!(backend.rows(Collection::Profile).is_empty());

        let own = PendingChange::upsert(
            Collection::Profile,
            from_value(json!({"id": owner.to_string(), "company_name": "Mine"})),
            None,
        );
        assert_eq!(reconciler.reconcile(owner, vec![own]).unwrap().applied, 1);
    }

    #[test]
    fn test_resolve_keep_local_overwrites() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);
        let change = PendingChange::upsert(Collection::Clients, edited_client("Acme Corp"), None);
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();

        reconciler
            .resolve(owner, &outcome.conflicts[0], Resolution::KeepLocal)
            .unwrap();

        assert_eq!(backend.rows(Collection::Clients)[0]["name"], "Acme Corp");
        let audit = backend.audit_entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::SyncResolve);
        assert_eq!(audit[0].options["resolution"], "keep_local");
    }

    #[test]
    fn test_resolve_keep_server_writes_no_rows() {
        let (backend, owner) = setup();
        let reconciler = Reconciler::new(&backend);
        let change = PendingChange::upsert(Collection::Clients, edited_client("Acme Corp"), None);
        let outcome = reconciler.reconcile(owner, vec![change]).unwrap();
        let before = backend.stats();

        reconciler
            .resolve(owner, &outcome.conflicts[0], Resolution::KeepServer)
            .unwrap();

        let after = backend.stats();
        assert_eq!(after.upserts, before.upserts);
        assert_eq!(after.deletes, before.deletes);
        assert_eq!(backend.rows(Collection::Clients)[0]["name"], "Acme");
    }

    #[test]
    fn test_pending_change_json_shape() {
        let change = PendingChange::delete(Collection::InvoicePayments, "pay-1", None);
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(
            value,
            json!({"collection": "invoice_payments", "record_id": "pay-1", "kind": "delete"})
        );
    }
}
