// Estimate repository: CRUD, status labels, invoice conversion

use crate::engine::{now_ms, Engine};
use crate::error::{Result, StoreError};
use crate::filter::{Filter, IndexValue};
use crate::models::{
    Estimate, EstimatePatch, EstimateStatus, InvoiceDraft, NewEstimate, items_subtotal,
};
use crate::schema::ESTIMATES;
use tracing::debug;

/// Short-lived handle over the estimates store
pub struct Estimates<'a> {
    engine: &'a mut Engine,
}

impl Engine {
    pub fn estimates(&mut self) -> Estimates<'_> {
        Estimates { engine: self }
    }
}

impl Estimates<'_> {
    /// Create an estimate for a client.
    ///
    /// The owning client id is required but not resolved; a reference to a
    /// client that never existed (or was deleted) is tolerated.
    pub fn create(&mut self, new: NewEstimate) -> Result<Estimate> {
        if new.client_id.trim().is_empty() {
            return Err(StoreError::validation("estimate clientId is required"));
        }

        let estimate = Estimate {
            id: Engine::generate_id(),
            client_id: new.client_id,
            total: items_subtotal(&new.items),
            items: new.items,
            status: EstimateStatus::Draft,
            created_at: now_ms(),
        };

        let value = serde_json::to_value(&estimate)?;
        self.engine.put(ESTIMATES, &estimate.id, &value)?;
        debug!(id = %estimate.id, client = %estimate.client_id, "Created estimate");
        Ok(estimate)
    }

    pub fn get(&self, id: &str) -> Result<Option<Estimate>> {
        match self.engine.get(ESTIMATES, id)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<Estimate>> {
        self.engine
            .scan(ESTIMATES)?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Shallow-merge a patch onto the stored estimate.
    ///
    /// Identifier, owning client, and creation timestamp are pinned from the
    /// stored record. A patch carrying items recomputes the total; the total
    /// itself is never patchable.
    pub fn update(&mut self, id: &str, patch: EstimatePatch) -> Result<Estimate> {
        let mut estimate = self
            .get(id)?
            .ok_or_else(|| StoreError::not_found("estimate", id))?;

        if let Some(items) = patch.items {
            estimate.total = items_subtotal(&items);
            estimate.items = items;
        }
        if let Some(status) = patch.status {
            estimate.status = status;
        }

        let value = serde_json::to_value(&estimate)?;
        self.engine.put(ESTIMATES, id, &value)?;
        Ok(estimate)
    }

    /// Set the status from a label, validating it against the enumeration.
    ///
    /// Statuses are plain labels: any status may move to any other.
    pub fn update_status(&mut self, id: &str, status: &str) -> Result<Estimate> {
        let status = EstimateStatus::parse(status)?;
        self.update(
            id,
            EstimatePatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.engine.delete(ESTIMATES, id)
    }

    /// Estimates owned by a client, via the clientId index.
    pub fn list_by_client(&self, client_id: &str) -> Result<Vec<Estimate>> {
        self.engine
            .query(
                ESTIMATES,
                &[Filter::eq(
                    "clientId",
                    IndexValue::String(client_id.to_string()),
                )],
            )?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Estimates in a given status, via the status index.
    pub fn list_by_status(&self, status: EstimateStatus) -> Result<Vec<Estimate>> {
        self.engine
            .query(
                ESTIMATES,
                &[Filter::eq(
                    "status",
                    IndexValue::String(status.as_str().to_string()),
                )],
            )?
            .into_iter()
            .map(|v| Ok(serde_json::from_value(v)?))
            .collect()
    }

    /// Project an estimate into invoice-creation input.
    ///
    /// Pure read: the invoice itself is created by a separate explicit call,
    /// so there is no implicit double-write.
    pub fn convert_to_invoice(&self, id: &str) -> Result<InvoiceDraft> {
        let estimate = self
            .get(id)?
            .ok_or_else(|| StoreError::not_found("estimate", id))?;

        Ok(InvoiceDraft {
            client_id: estimate.client_id,
            estimate_id: estimate.id,
            items: estimate.items,
        })
    }
}
