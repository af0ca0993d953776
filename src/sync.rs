// Export / import / shareable backup across all three stores

use crate::engine::Engine;
use crate::error::{Result, StoreError};
use crate::schema::{CLIENTS, ESTIMATES, INVOICES};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Export format version
pub const EXPORT_VERSION: u32 = 1;

/// Full-dataset snapshot.
///
/// Reads are not wrapped in a cross-store transaction, so a snapshot taken
/// while writes are in flight is best-effort consistent, not atomic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub version: u32,
    /// ISO-8601 export timestamp
    pub export_date: String,
    pub data: ExportData,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub clients: Vec<Value>,
    pub estimates: Vec<Value>,
    pub invoices: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub client_count: usize,
    pub estimate_count: usize,
    pub invoice_count: usize,
}

/// How an import treats the existing dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Upsert by identifier; existing ids are overwritten (last write wins).
    Merge,
    /// Erase all three stores first, then merge.
    Replace,
}

impl ImportMode {
    pub fn parse(s: &str) -> Result<ImportMode> {
        match s {
            "merge" => Ok(ImportMode::Merge),
            "replace" => Ok(ImportMode::Replace),
            other => Err(StoreError::validation(format!(
                "invalid import mode '{other}' (expected merge or replace)"
            ))),
        }
    }
}

/// Per-entity import outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportTally {
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Outcome of an import, tallied per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub clients: ImportTally,
    pub estimates: ImportTally,
    pub invoices: ImportTally,
}

/// Read-only aggregate counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total_clients: u64,
    pub total_estimates: u64,
    pub total_invoices: u64,
    pub total_records: u64,
}

/// Snapshot all three stores into an export bundle.
pub fn export_all(engine: &mut Engine) -> Result<ExportBundle> {
    let clients: Vec<Value> = engine
        .clients()
        .list()?
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<_, _>>()?;
    let estimates: Vec<Value> = engine
        .estimates()
        .list()?
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<_, _>>()?;
    let invoices: Vec<Value> = engine
        .invoices()
        .list()?
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<_, _>>()?;

    let metadata = ExportMetadata {
        client_count: clients.len(),
        estimate_count: estimates.len(),
        invoice_count: invoices.len(),
    };

    info!(
        clients = metadata.client_count,
        estimates = metadata.estimate_count,
        invoices = metadata.invoice_count,
        "Exported dataset"
    );

    Ok(ExportBundle {
        version: EXPORT_VERSION,
        export_date: chrono::Utc::now().to_rfc3339(),
        data: ExportData {
            clients,
            estimates,
            invoices,
        },
        metadata,
    })
}

/// Import a bundle into the store.
///
/// Merge upserts every record by identifier; collisions are overwrites, not
/// conflicts. Replace erases all three stores first. Individual record
/// failures are tallied and skipped over; there is no all-or-nothing
/// rollback, so a crash mid-import can leave a partial dataset.
pub fn import_all(engine: &mut Engine, bundle: &ExportBundle, mode: ImportMode) -> Result<ImportReport> {
    if mode == ImportMode::Replace {
        clear_all_data(engine)?;
    }

    let report = ImportReport {
        clients: import_store(engine, CLIENTS, &bundle.data.clients)?,
        estimates: import_store(engine, ESTIMATES, &bundle.data.estimates)?,
        invoices: import_store(engine, INVOICES, &bundle.data.invoices)?,
    };

    info!(?mode, ?report, "Import complete");
    Ok(report)
}

fn import_store(engine: &mut Engine, store: &str, records: &[Value]) -> Result<ImportTally> {
    let mut tally = ImportTally::default();

    for record in records {
        let valid = match store {
            CLIENTS => serde_json::from_value::<crate::models::Client>(record.clone()).is_ok(),
            ESTIMATES => serde_json::from_value::<crate::models::Estimate>(record.clone()).is_ok(),
            _ => serde_json::from_value::<crate::models::Invoice>(record.clone()).is_ok(),
        };
        if !valid {
            warn!(store, "Dropping bundle record that does not deserialize");
            tally.errors += 1;
            continue;
        }

        // Validity implies a string id is present
        let id = record
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        match engine.put(store, &id, record) {
            Ok(()) => tally.imported += 1,
            Err(StoreError::Constraint(_)) => tally.skipped += 1,
            Err(e) => {
                warn!(store, id, error = %e, "Failed to import record");
                tally.errors += 1;
            }
        }
    }

    Ok(tally)
}

/// Export the dataset as a single text-safe string (base64 over JSON),
/// sized for narrow transport channels.
pub fn create_shareable_backup(engine: &mut Engine) -> Result<String> {
    let bundle = export_all(engine)?;
    let json = serde_json::to_string(&bundle)?;
    Ok(BASE64.encode(json))
}

/// Decode and import a shareable backup.
///
/// Decoding happens in full before any store is touched, so a corrupt
/// payload cannot partially apply (the replace-mode erase included).
pub fn restore_from_shareable_backup(
    engine: &mut Engine,
    encoded: &str,
    mode: ImportMode,
) -> Result<ImportReport> {
    let json = BASE64
        .decode(encoded.trim())
        .map_err(|e| StoreError::Decode(format!("invalid base64: {e}")))?;
    let bundle: ExportBundle = serde_json::from_slice(&json)
        .map_err(|e| StoreError::Decode(format!("invalid backup JSON: {e}")))?;

    import_all(engine, &bundle, mode)
}

/// Aggregate record counts; no side effects.
pub fn get_stats(engine: &Engine) -> Result<StoreStats> {
    let total_clients = engine.count(CLIENTS)?;
    let total_estimates = engine.count(ESTIMATES)?;
    let total_invoices = engine.count(INVOICES)?;

    Ok(StoreStats {
        total_clients,
        total_estimates,
        total_invoices,
        total_records: total_clients + total_estimates + total_invoices,
    })
}

/// Erase all three stores.
pub fn clear_all_data(engine: &mut Engine) -> Result<()> {
    engine.clear(CLIENTS)?;
    engine.clear(ESTIMATES)?;
    engine.clear(INVOICES)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, NewClient, NewEstimate, NewInvoice};
    use base64::Engine as _;
    use serde_json::json;
    use tempfile::TempDir;

    fn item(desc: &str, qty: f64, price: f64) -> LineItem {
        LineItem {
            description: desc.to_string(),
            quantity: qty,
            unit_price: price,
        }
    }

    fn seed(engine: &mut Engine) -> (String, String, String) {
        let client = engine
            .clients()
            .create(NewClient {
                name: "Ada Lovelace".to_string(),
                phone: "555-0100".to_string(),
                email: "ada@example.com".to_string(),
                address: "1 Main St".to_string(),
            })
            .unwrap();
        let estimate = engine
            .estimates()
            .create(NewEstimate {
                client_id: client.id.clone(),
                items: vec![item("Mow", 1.0, 50.0)],
            })
            .unwrap();
        let invoice = engine
            .invoices()
            .create(
                NewInvoice {
                    client_id: client.id.clone(),
                    estimate_id: Some(estimate.id.clone()),
                    items: vec![item("Mow", 1.0, 50.0)],
                },
                0.06,
            )
            .unwrap();
        (client.id, estimate.id, invoice.id)
    }

    #[test]
    fn test_export_bundle_shape() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        seed(&mut engine);

        let bundle = export_all(&mut engine).unwrap();
        assert_eq!(bundle.version, EXPORT_VERSION);
        assert_eq!(bundle.metadata.client_count, 1);
        assert_eq!(bundle.metadata.estimate_count, 1);
        assert_eq!(bundle.metadata.invoice_count, 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&bundle.export_date).is_ok());

        // Wire shape is camelCase
        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json.get("exportDate").is_some());
        assert!(json["metadata"].get("clientCount").is_some());
    }

    #[test]
    fn test_export_import_replace_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        let (client_id, estimate_id, invoice_id) = seed(&mut engine);

        let bundle = export_all(&mut engine).unwrap();
        let report = import_all(&mut engine, &bundle, ImportMode::Replace).unwrap();

        assert_eq!(report.clients.imported, 1);
        assert_eq!(report.estimates.imported, 1);
        assert_eq!(report.invoices.imported, 1);
        assert_eq!(report.clients.errors, 0);

        // Dataset is equivalent after the round trip
        let client = engine.clients().get(&client_id).unwrap().unwrap();
        assert_eq!(client.name, "Ada Lovelace");
        let estimate = engine.estimates().get(&estimate_id).unwrap().unwrap();
        assert_eq!(estimate.total, 50.0);
        let invoice = engine.invoices().get(&invoice_id).unwrap().unwrap();
        assert_eq!(invoice.total, 53.0);
        assert_eq!(get_stats(&engine).unwrap().total_records, 3);
    }

    #[test]
    fn test_merge_overwrites_existing_id_as_imported() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        let (client_id, _, _) = seed(&mut engine);

        let mut bundle = export_all(&mut engine).unwrap();
        bundle.data.clients[0]["name"] = json!("Ada Byron");

        let report = import_all(&mut engine, &bundle, ImportMode::Merge).unwrap();
        assert_eq!(report.clients.imported, 1);
        assert_eq!(report.clients.skipped, 0);

        // Last writer (the import) wins
        let client = engine.clients().get(&client_id).unwrap().unwrap();
        assert_eq!(client.name, "Ada Byron");
    }

    #[test]
    fn test_replace_erases_records_missing_from_bundle() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        seed(&mut engine);

        let bundle = export_all(&mut engine).unwrap();

        // A record created after the export disappears on replace-import
        let extra = engine
            .clients()
            .create(NewClient {
                name: "Grace Hopper".to_string(),
                ..Default::default()
            })
            .unwrap();

        import_all(&mut engine, &bundle, ImportMode::Replace).unwrap();
        assert!(engine.clients().get(&extra.id).unwrap().is_none());
        assert_eq!(get_stats(&engine).unwrap().total_clients, 1);

        // Under merge the extra record would have survived
    }

    #[test]
    fn test_malformed_records_are_tallied_and_skipped_over() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        let bundle = ExportBundle {
            version: EXPORT_VERSION,
            export_date: chrono::Utc::now().to_rfc3339(),
            data: ExportData {
                clients: vec![
                    json!({"id": "c1", "name": "Valid", "createdAt": 1000}),
                    json!({"name": "No id"}),
                    json!({"id": "c2", "name": "Also valid", "createdAt": 2000}),
                ],
                estimates: vec![json!("not even an object")],
                invoices: vec![],
            },
            metadata: ExportMetadata {
                client_count: 3,
                estimate_count: 1,
                invoice_count: 0,
            },
        };

        let report = import_all(&mut engine, &bundle, ImportMode::Merge).unwrap();
        assert_eq!(report.clients.imported, 2);
        assert_eq!(report.clients.errors, 1);
        assert_eq!(report.estimates.errors, 1);
        assert_eq!(report.estimates.imported, 0);

        // The valid records made it in despite their bad neighbors
        assert!(engine.clients().get("c1").unwrap().is_some());
        assert!(engine.clients().get("c2").unwrap().is_some());
    }

    #[test]
    fn test_shareable_backup_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        let (client_id, _, invoice_id) = seed(&mut engine);

        let encoded = create_shareable_backup(&mut engine).unwrap();
        // Text-safe transport string
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));

        engine.erase_all().unwrap();
        assert_eq!(get_stats(&engine).unwrap().total_records, 0);

        let report = restore_from_shareable_backup(&mut engine, &encoded, ImportMode::Replace).unwrap();
        assert_eq!(report.clients.imported, 1);
        assert!(engine.clients().get(&client_id).unwrap().is_some());
        assert_eq!(engine.invoices().get(&invoice_id).unwrap().unwrap().total, 53.0);
    }

    #[test]
    fn test_corrupt_backup_fails_before_any_mutation() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        seed(&mut engine);

        let err = restore_from_shareable_backup(&mut engine, "!!! not base64 !!!", ImportMode::Replace)
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));

        // Valid base64 wrapping invalid JSON also fails with Decode
        let encoded = BASE64.encode("{\"version\": 1, \"truncated\":");
        let err = restore_from_shareable_backup(&mut engine, &encoded, ImportMode::Replace).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));

        // Replace-mode erase never ran
        assert_eq!(get_stats(&engine).unwrap().total_records, 3);
    }

    #[test]
    fn test_import_mode_parse() {
        assert_eq!(ImportMode::parse("merge").unwrap(), ImportMode::Merge);
        assert_eq!(ImportMode::parse("replace").unwrap(), ImportMode::Replace);
        assert!(matches!(
            ImportMode::parse("append"),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn test_get_stats_is_read_only() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();
        seed(&mut engine);

        let before = get_stats(&engine).unwrap();
        let after = get_stats(&engine).unwrap();
        assert_eq!(before, after);
        assert_eq!(before.total_clients, 1);
        assert_eq!(before.total_records, 3);
    }

    #[test]
    fn test_end_to_end_job_flow() {
        let temp = TempDir::new().unwrap();
        let mut engine = Engine::open(temp.path()).unwrap();

        // Client -> estimate -> conversion -> invoice -> paid -> client gone
        let client = engine
            .clients()
            .create(NewClient {
                name: "A. Customer".to_string(),
                ..Default::default()
            })
            .unwrap();

        let estimate = engine
            .estimates()
            .create(NewEstimate {
                client_id: client.id.clone(),
                items: vec![item("Mow", 1.0, 50.0)],
            })
            .unwrap();
        assert_eq!(estimate.total, 50.0);

        let draft = engine.estimates().convert_to_invoice(&estimate.id).unwrap();
        let invoice = engine.invoices().create(draft.into(), 0.06).unwrap();
        assert_eq!(invoice.subtotal, 50.0);
        assert_eq!(invoice.tax_amount, 3.0);
        assert_eq!(invoice.total, 53.0);
        assert_eq!(invoice.status.as_str(), "draft");

        engine.invoices().mark_as_paid(&invoice.id).unwrap();
        assert_eq!(
            engine.invoices().get(&invoice.id).unwrap().unwrap().status.as_str(),
            "paid"
        );

        // Deleting the client does not cascade; the invoice dangles intact
        engine.clients().delete(&client.id).unwrap();
        let orphaned = engine.invoices().get(&invoice.id).unwrap().unwrap();
        assert_eq!(orphaned.client_id, client.id);
        assert_eq!(orphaned.total, 53.0);
    }
}
