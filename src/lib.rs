// bizstore - Local-first record store for clients, estimates, and invoices

pub mod clients;
pub mod engine;
pub mod error;
pub mod estimates;
pub mod filter;
pub mod invoices;
pub mod models;
pub mod schema;
pub mod sync;

// Re-export main types for convenience
pub use engine::{Engine, now_ms};
pub use error::{Result, StoreError};
pub use filter::{Filter, FilterOp, IndexValue};
pub use models::{
    Client, ClientPatch, Estimate, EstimatePatch, EstimateStatus, Invoice, InvoiceDraft,
    InvoicePatch, InvoiceStatus, LineItem, NewClient, NewEstimate, NewInvoice,
};
pub use sync::{ExportBundle, ImportMode, ImportReport, StoreStats};
