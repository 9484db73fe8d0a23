//! Per-collection include flags shared by backup and restore

use serde::{Deserialize, Serialize};

use crate::models::Collection;

/// One switch per top-level collection
///
/// Line items follow their parent: `invoice_products` and
/// `invoice_payments` ride on `invoices`, `estimate_products` on `estimates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeFlags {
    pub invoices: bool,
    pub estimates: bool,
    pub clients: bool,
    pub recurring_invoices: bool,
    pub profile: bool,
    pub settings: bool,
    pub products: bool,
}

impl Default for IncludeFlags {
    fn default() -> Self {
        Self::all()
    }
}

impl IncludeFlags {
    pub fn all() -> Self {
        Self {
            invoices: true,
            estimates: true,
            clients: true,
            recurring_invoices: true,
            profile: true,
            settings: true,
            products: true,
        }
    }

    pub fn none() -> Self {
        Self {
            invoices: false,
            estimates: false,
            clients: false,
            recurring_invoices: false,
            profile: false,
            settings: false,
            products: false,
        }
    }

    /// Everything except the listed collections
    pub fn excluding(excluded: &[Collection]) -> Self {
        excluded
            .iter()
            .fold(Self::all(), |flags, c| flags.with(*c, false))
    }

    /// Only the listed collections
    pub fn only(included: &[Collection]) -> Self {
        included
            .iter()
            .fold(Self::none(), |flags, c| flags.with(*c, true))
    }

    /// Set the switch governing `collection`
    pub fn with(mut self, collection: Collection, on: bool) -> Self {
        *self.switch_mut(collection) = on;
        self
    }

    pub fn includes(&self, collection: Collection) -> bool {
        match collection {
            Collection::Invoices | Collection::InvoiceProducts | Collection::InvoicePayments => {
                self.invoices
            }
            Collection::Estimates | Collection::EstimateProducts => self.estimates,
            Collection::Clients => self.clients,
            Collection::RecurringInvoices => self.recurring_invoices,
            Collection::Profile => self.profile,
            Collection::Settings => self.settings,
            Collection::Products => self.products,
        }
    }

    fn switch_mut(&mut self, collection: Collection) -> &mut bool {
        match collection {
            Collection::Invoices | Collection::InvoiceProducts | Collection::InvoicePayments => {
                &mut self.invoices
            }
            Collection::Estimates | Collection::EstimateProducts => &mut self.estimates,
            Collection::Clients => &mut self.clients,
            Collection::RecurringInvoices => &mut self.recurring_invoices,
            Collection::Profile => &mut self.profile,
            Collection::Settings => &mut self.settings,
            Collection::Products => &mut self.products,
        }
    }

    /// Every collection these flags select, line items included
    pub fn selected(&self) -> Vec<Collection> {
        Collection::all()
            .iter()
            .copied()
            .filter(|c| self.includes(*c))
            .collect()
    }
}
