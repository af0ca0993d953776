// Typed records for the client / estimate / invoice stores

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};

/// Round to 2 decimal places, half away from zero.
///
/// All stored monetary fields pass through this; a stored total must never
/// drift from a fresh recomputation over the record's own items.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One line on an estimate or invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

/// Sum of quantity x unit price across items, rounded to cents.
pub fn items_subtotal(items: &[LineItem]) -> f64 {
    round2(items.iter().map(|i| i.quantity * i.unit_price).sum())
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    pub created_at: i64,
}

/// Payload for creating a client
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Partial update for a client; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

// ============================================================================
// Estimate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Sent => "sent",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
        }
    }

    /// Parse a status label, rejecting anything outside the enumeration.
    pub fn parse(s: &str) -> Result<EstimateStatus> {
        match s {
            "draft" => Ok(EstimateStatus::Draft),
            "sent" => Ok(EstimateStatus::Sent),
            "approved" => Ok(EstimateStatus::Approved),
            "rejected" => Ok(EstimateStatus::Rejected),
            other => Err(StoreError::validation(format!(
                "invalid estimate status '{other}' (expected draft, sent, approved, or rejected)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    pub id: String,
    /// Owning client; set at creation, immutable afterwards. May dangle if
    /// the client is later deleted.
    pub client_id: String,
    pub items: Vec<LineItem>,
    /// Always derived from `items`; never hand-edited.
    pub total: f64,
    pub status: EstimateStatus,
    pub created_at: i64,
}

/// Payload for creating an estimate
#[derive(Debug, Clone)]
pub struct NewEstimate {
    pub client_id: String,
    pub items: Vec<LineItem>,
}

/// Partial update for an estimate; items trigger total recomputation
#[derive(Debug, Clone, Default)]
pub struct EstimatePatch {
    pub items: Option<Vec<LineItem>>,
    pub status: Option<EstimateStatus>,
}

// ============================================================================
// Invoice
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Parse a status label, rejecting anything outside the enumeration.
    pub fn parse(s: &str) -> Result<InvoiceStatus> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(StoreError::validation(format!(
                "invalid invoice status '{other}' (expected draft, sent, or paid)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    /// Owning client; immutable, may dangle after client deletion.
    pub client_id: String,
    /// Originating estimate, when the invoice was converted from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_id: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    /// Frozen at creation from the business configuration.
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total: f64,
    pub status: InvoiceStatus,
    pub created_at: i64,
}

impl Invoice {
    /// Recompute subtotal, tax, and total from the current items.
    pub(crate) fn recompute_totals(&mut self) {
        self.subtotal = items_subtotal(&self.items);
        self.tax_amount = round2(self.subtotal * self.tax_rate);
        self.total = round2(self.subtotal + self.tax_amount);
    }
}

/// Payload for creating an invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_id: String,
    pub estimate_id: Option<String>,
    pub items: Vec<LineItem>,
}

/// Partial update for an invoice; items trigger monetary recomputation
#[derive(Debug, Clone, Default)]
pub struct InvoicePatch {
    pub items: Option<Vec<LineItem>>,
    pub status: Option<InvoiceStatus>,
}

/// Projection of an estimate suitable as invoice-creation input.
///
/// Returned by estimate conversion; creating the invoice is a separate,
/// explicit call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub client_id: String,
    pub estimate_id: String,
    pub items: Vec<LineItem>,
}

impl From<InvoiceDraft> for NewInvoice {
    fn from(draft: InvoiceDraft) -> NewInvoice {
        NewInvoice {
            client_id: draft.client_id,
            estimate_id: Some(draft.estimate_id),
            items: draft.items,
        }
    }
}
