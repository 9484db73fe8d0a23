//! In-process table shared by the memory and JSON-file backends
//!
//! Rows keep insertion order. Primary keys are unique per table.

use serde::{Deserialize, Serialize};

use crate::error::{InvoicingError, InvoicingResult};
use crate::models::record::{record_id, set_string, Record, ID_COLUMN};
use crate::models::{new_record_id, Collection};

use super::filter::Filter;

/// Rows of a single collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    pub records: Vec<Record>,
}

impl Table {
    pub fn select(&self, filter: &Filter) -> Vec<Record> {
        self.records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| record_id(r).as_deref() == Some(id))
    }

    /// Insert a new row; a missing `id` is generated
    pub fn insert(&mut self, collection: Collection, mut record: Record) -> InvoicingResult<Record> {
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = new_record_id();
                set_string(&mut record, ID_COLUMN, id.clone());
                id
            }
        };

        if self.position(&id).is_some() {
            return Err(InvoicingError::Storage(format!(
                "duplicate key value violates unique constraint on {}.id: {}",
                collection, id
            )));
        }

        self.records.push(record.clone());
        Ok(record)
    }

    /// Merge `changes` into an existing row
    pub fn update(
        &mut self,
        collection: Collection,
        id: &str,
        changes: Record,
    ) -> InvoicingResult<Record> {
        let index = self.position(id).ok_or_else(|| InvoicingError::NotFound {
            entity_type: "Record",
            identifier: format!("{}/{}", collection, id),
        })?;

        let row = &mut self.records[index];
        for (column, value) in changes {
            if column != ID_COLUMN {
                row.insert(column, value);
            }
        }
        Ok(row.clone())
    }

    /// Replace the row with the same `id`, or insert it
    pub fn upsert(&mut self, collection: Collection, record: Record) -> InvoicingResult<Record> {
        let id = record_id(&record).ok_or_else(|| {
            InvoicingError::Storage(format!("upsert into {} requires an id", collection))
        })?;

        match self.position(&id) {
            Some(index) => {
                self.records[index] = record.clone();
                Ok(record)
            }
            None => self.insert(collection, record),
        }
    }

    /// Remove matching rows, returning how many went
    pub fn delete(&mut self, filter: &Filter) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !filter.matches(r));
        before - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::from_value;
    use serde_json::json;

    #[test]
    fn test_insert_generates_missing_id() {
        let mut table = Table::default();
        let inserted = table
            .insert(Collection::Clients, from_value(json!({"name": "Acme"})))
            .unwrap();
        assert!(record_id(&inserted).is_some());
        assert_eq!(table.records.len(), 1);
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut table = Table::default();
        table
            .insert(Collection::Clients, from_value(json!({"id": "c1"})))
            .unwrap();
        let err = table
            .insert(Collection::Clients, from_value(json!({"id": "c1"})))
            .unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn test_update_merges_and_keeps_id() {
        let mut table = Table::default();
        table
            .insert(
                Collection::Clients,
                from_value(json!({"id": "c1", "name": "Acme", "city": "Oslo"})),
            )
            .unwrap();

        let updated = table
            .update(
                Collection::Clients,
                "c1",
                from_value(json!({"id": "other", "name": "Acme AS"})),
            )
            .unwrap();

        assert_eq!(updated["id"], "c1");
        assert_eq!(updated["name"], "Acme AS");
        assert_eq!(updated["city"], "Oslo");
    }

    #[test]
    fn test_update_missing_row() {
        let mut table = Table::default();
        let err = table
            .update(Collection::Clients, "nope", Record::new())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_upsert_replaces() {
        let mut table = Table::default();
        table
            .upsert(Collection::Profile, from_value(json!({"id": "p", "name": "A"})))
            .unwrap();
        table
            .upsert(Collection::Profile, from_value(json!({"id": "p", "name": "B"})))
            .unwrap();
        assert_eq!(table.records.len(), 1);
        assert_eq!(table.records[0]["name"], "B");
    }

    #[test]
    fn test_delete_with_filter() {
        let mut table = Table::default();
        for (id, owner) in [("a", "u1"), ("b", "u1"), ("c", "u2")] {
            table
                .insert(
                    Collection::Clients,
                    from_value(json!({"id": id, "user_id": owner})),
                )
                .unwrap();
        }
        assert_eq!(table.delete(&Filter::eq("user_id", "u1")), 2);
        assert_eq!(table.records.len(), 1);
    }
}
