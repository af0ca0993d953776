// Invoice repository: CRUD, tax math, payment status helpers

use crate::engine::{now_ms, Engine};
use crate::error::{Result, StoreError};
use crate::filter::{Filter, IndexValue};
use crate::models::{Invoice, InvoicePatch, InvoiceStatus, NewInvoice};
use crate::schema::INVOICES;
use tracing::debug;

/// Short-lived handle over the invoices store
pub struct Invoices<'a> {
    engine: &'a mut Engine,
}

impl Engine {
    pub fn invoices(&mut self) -> Invoices<'_> {
        Invoices { engine: self }
    }
}

impl Invoices<'_> {
    /// Create an invoice for a client.
    ///
    /// The tax rate comes from the external business configuration, is read
    /// once here, and is frozen on the record; later rate changes never
    /// retroactively alter an invoice. The owning client id is required but
    /// not resolved.
    pub fn create(&mut self, new: NewInvoice, tax_rate: f64) -> Result<Invoice> {
        if new.client_id.trim().is_empty() {
            return Err(StoreError::validation("invoice clientId is required"));
        }
        if !tax_rate.is_finite() || tax_rate < 0.0 {
            return Err(StoreError::validation(format!(
                "tax rate must be a non-negative fraction, got {tax_rate}"
            )));
        }

        let mut invoice = Invoice {
            id: Engine::generate_id(),
            client_id: new.client_id,
            estimate_id: new.estimate_id,
            items: new.items,
            subtotal: 0.0,
            tax_rate,
            tax_amount: 0.0,
            total: 0.0,
            status: InvoiceStatus::Draft,
            created_at: now_ms(),
        };
        invoice.recompute_totals();

        let value = serde_json::to_value(&invoice)?;
        self.engine.put(INVOICES, &invoice.id, &value)?;
        debug!(id = %invoice.id, client = %invoice.client_id, total = invoice.total, "Created invoice");
        Ok(invoice)
    }

    pub fn get(&self, id: &str) -> Result<Option<Invoice>> {
        match self.engine.get(INVOICES, id)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<Invoice>> {
        self.engine
            .scan(INVOICES)?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Shallow-merge a patch onto the stored invoice.
    ///
    /// Identifier, owning client, originating estimate, tax rate, and
    /// creation timestamp are pinned from the stored record. A patch
    /// carrying items recomputes subtotal, tax, and total at the frozen
    /// rate.
    pub fn update(&mut self, id: &str, patch: InvoicePatch) -> Result<Invoice> {
        let mut invoice = self
            .get(id)?
            .ok_or_else(|| StoreError::not_found("invoice", id))?;

        if let Some(items) = patch.items {
            invoice.items = items;
            invoice.recompute_totals();
        }
        if let Some(status) = patch.status {
            invoice.status = status;
        }

        let value = serde_json::to_value(&invoice)?;
        self.engine.put(INVOICES, id, &value)?;
        Ok(invoice)
    }

    /// Set the status from a label, validating it against the enumeration.
    pub fn update_status(&mut self, id: &str, status: &str) -> Result<Invoice> {
        let status = InvoiceStatus::parse(status)?;
        self.update(
            id,
            InvoicePatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Move the invoice to paid.
    pub fn mark_as_paid(&mut self, id: &str) -> Result<Invoice> {
        self.update(
            id,
            InvoicePatch {
                status: Some(InvoiceStatus::Paid),
                ..Default::default()
            },
        )
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.engine.delete(INVOICES, id)
    }

    /// Invoices owned by a client, via the clientId index.
    pub fn list_by_client(&self, client_id: &str) -> Result<Vec<Invoice>> {
        self.engine
            .query(
                INVOICES,
                &[Filter::eq(
                    "clientId",
                    IndexValue::String(client_id.to_string()),
                )],
            )?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Invoices in a given status, via the status index.
    pub fn list_by_status(&self, status: InvoiceStatus) -> Result<Vec<Invoice>> {
        self.engine
            .query(
                INVOICES,
                &[Filter::eq(
                    "status",
                    IndexValue::String(status.as_str().to_string()),
                )],
            )?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Invoices converted from a given estimate.
    ///
    /// estimateId is not indexed; small-cardinality full scan with an
    /// in-memory predicate.
    pub fn list_by_estimate(&self, estimate_id: &str) -> Result<Vec<Invoice>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|i| i.estimate_id.as_deref() == Some(estimate_id))
            .collect())
    }

    /// Invoices still awaiting payment (draft or sent).
    pub fn list_unpaid(&self) -> Result<Vec<Invoice>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|i| matches!(i.status, InvoiceStatus::Draft | InvoiceStatus::Sent))
            .collect())
    }

    /// Paid invoices.
    pub fn list_paid(&self) -> Result<Vec<Invoice>> {
        self.list_by_status(InvoiceStatus::Paid)
    }
}
