//! Entity collections and the links between them
//!
//! A collection is one backend table. Each collection knows how rows are
//! scoped to an owner and which parent (if any) its rows hang off.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvoicingError;

/// One entity collection in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Clients,
    Products,
    Invoices,
    InvoiceProducts,
    InvoicePayments,
    Estimates,
    EstimateProducts,
    RecurringInvoices,
    Profile,
    Settings,
}

/// A foreign key column pointing at another collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub column: &'static str,
    pub target: Collection,
}

/// How rows of a collection are scoped to their owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// `user_id = owner`
    UserColumn,
    /// `id = owner` (one row per owner)
    Singleton,
    /// Owned through the parent row
    Parent(Link),
}

impl Collection {
    /// Restore order. Parents always precede their children.
    pub const RESTORE_ORDER: [Collection; 10] = [
        Collection::Clients,
        Collection::Products,
        Collection::Invoices,
        Collection::InvoiceProducts,
        Collection::InvoicePayments,
        Collection::Estimates,
        Collection::EstimateProducts,
        Collection::RecurringInvoices,
        Collection::Profile,
        Collection::Settings,
    ];

    /// Collections the user selects directly; line items follow their parents
    pub const TOP_LEVEL: [Collection; 7] = [
        Collection::Invoices,
        Collection::Estimates,
        Collection::Clients,
        Collection::RecurringInvoices,
        Collection::Profile,
        Collection::Settings,
        Collection::Products,
    ];

    /// Table name, also the key under `data` in a snapshot
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::Products => "products",
            Collection::Invoices => "invoices",
            Collection::InvoiceProducts => "invoice_products",
            Collection::InvoicePayments => "invoice_payments",
            Collection::Estimates => "estimates",
            Collection::EstimateProducts => "estimate_products",
            Collection::RecurringInvoices => "recurring_invoices",
            Collection::Profile => "profile",
            Collection::Settings => "settings",
        }
    }

    pub fn all() -> &'static [Collection] {
        &Self::RESTORE_ORDER
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            Collection::Profile | Collection::Settings => Ownership::Singleton,
            Collection::InvoiceProducts | Collection::InvoicePayments => {
                Ownership::Parent(Link {
                    column: "invoice_id",
                    target: Collection::Invoices,
                })
            }
            Collection::EstimateProducts => Ownership::Parent(Link {
                column: "estimate_id",
                target: Collection::Estimates,
            }),
            _ => Ownership::UserColumn,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self.ownership(), Ownership::Singleton)
    }

    /// Hard parent link; rows whose parent is missing get dropped
    pub fn parent_link(&self) -> Option<Link> {
        match self.ownership() {
            Ownership::Parent(link) => Some(link),
            _ => None,
        }
    }

    /// Optional references that are rewritten when the target was remapped
    /// and left untouched otherwise
    pub fn soft_links(&self) -> &'static [Link] {
        const CLIENT: Link = Link {
            column: "client_id",
            target: Collection::Clients,
        };
        const PRODUCT: Link = Link {
            column: "product_id",
            target: Collection::Products,
        };
        match self {
            Collection::Invoices | Collection::Estimates | Collection::RecurringInvoices => {
                &[CLIENT]
            }
            Collection::InvoiceProducts | Collection::EstimateProducts => &[PRODUCT],
            _ => &[],
        }
    }

    /// Collections whose rows hang off this one
    pub fn children(&self) -> Vec<Collection> {
        Self::RESTORE_ORDER
            .iter()
            .copied()
            .filter(|c| c.parent_link().map(|l| l.target) == Some(*self))
            .collect()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = InvoicingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::RESTORE_ORDER
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| InvoicingError::NotFound {
                entity_type: "Collection",
                identifier: s.to_string(),
            })
    }
}
