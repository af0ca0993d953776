// Storage engine: one SQLite connection, schema-driven secondary indexes

use crate::error::{Result, StoreError};
use crate::filter::{Filter, FilterOp, IndexValue};
use crate::schema::{self, StoreSpec};
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Embedded record store over a single SQLite connection.
///
/// The engine is the sole owner of the database handle: `open` takes an
/// exclusive advisory lock on the store directory, so a second process (or a
/// second `Engine` in the same process) cannot open the same store. All
/// record operations run inside their own transaction; secondary indexes are
/// maintained from the schema registry on every write.
pub struct Engine {
    base_path: PathBuf,
    db: Connection,
    // Held for the lifetime of the engine; released on drop.
    _lock: File,
}

impl Engine {
    /// Open or create a store at the given path.
    ///
    /// The store lives in a `.bizstore` subdirectory of the given path.
    /// Fails with [`StoreError::Engine`] if another engine already holds the
    /// store, or if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Engine> {
        let base_path = path.as_ref().join(".bizstore");

        fs::create_dir_all(&base_path)
            .map_err(|e| StoreError::Engine(format!("failed to create store directory: {e}")))?;

        let lock = File::create(base_path.join(".lock"))?;
        lock.try_lock_exclusive()
            .map_err(|e| StoreError::Engine(format!("store is locked by another process: {e}")))?;

        let db_path = base_path.join("bizstore.db");
        let db = Connection::open(&db_path)
            .map_err(|e| StoreError::Engine(format!("failed to open database: {e}")))?;

        let engine = Engine {
            base_path,
            db,
            _lock: lock,
        };

        engine.apply_schema()?;

        Ok(engine)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Generate a new record identifier (random UUID).
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Close the engine, releasing the connection and the store lock.
    ///
    /// Consuming `self` makes a double close unrepresentable.
    pub fn close(self) {
        info!(path = ?self.base_path, "Closing store");
    }

    /// Apply the schema, upgrading the on-disk version if it is older.
    ///
    /// The DDL is idempotent, so a crash between the DDL and the version
    /// bump is repaired on the next open.
    fn apply_schema(&self) -> Result<()> {
        let stored: i32 = self
            .db
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if stored >= schema::SCHEMA_VERSION {
            debug!(version = stored, "Schema is current");
            return Ok(());
        }

        info!(
            from = stored,
            to = schema::SCHEMA_VERSION,
            "Upgrading store schema"
        );

        self.db.execute_batch(schema::SCHEMA_DDL)?;
        self.db
            .pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;

        Ok(())
    }

    fn spec(store: &str) -> Result<&'static StoreSpec> {
        schema::store_spec(store)
            .ok_or_else(|| StoreError::Engine(format!("unknown store '{store}'")))
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Insert or overwrite a record (upsert by identifier).
    pub fn put(&mut self, store: &str, id: &str, value: &Value) -> Result<()> {
        let spec = Self::spec(store)?;
        Self::validate_id(id)?;

        let data_json = serde_json::to_string(value)?;
        let created_at = value
            .get("createdAt")
            .and_then(|v| v.as_i64())
            .unwrap_or_else(now_ms);

        let tx = self.db.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO records (store, id, data_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![store, id, data_json, created_at, now_ms()],
        )?;

        Self::update_indexes_tx(&tx, spec, id, value)?;

        tx.commit()?;
        Ok(())
    }

    /// Insert a record, failing with [`StoreError::Constraint`] if the
    /// identifier already exists.
    pub fn insert(&mut self, store: &str, id: &str, value: &Value) -> Result<()> {
        let spec = Self::spec(store)?;
        Self::validate_id(id)?;

        let data_json = serde_json::to_string(value)?;
        let created_at = value
            .get("createdAt")
            .and_then(|v| v.as_i64())
            .unwrap_or_else(now_ms);

        let tx = self.db.transaction()?;

        tx.execute(
            "INSERT INTO records (store, id, data_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![store, id, data_json, created_at, now_ms()],
        )?;

        Self::update_indexes_tx(&tx, spec, id, value)?;

        tx.commit()?;
        Ok(())
    }

    /// Get a record by identifier.
    pub fn get(&self, store: &str, id: &str) -> Result<Option<Value>> {
        Self::spec(store)?;

        let mut stmt = self
            .db
            .prepare("SELECT data_json FROM records WHERE store = ?1 AND id = ?2")?;

        let result = stmt
            .query_row(rusqlite::params![store, id], |row| row.get::<_, String>(0))
            .optional()?;

        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete a record. Deleting an absent identifier is a no-op.
    pub fn delete(&mut self, store: &str, id: &str) -> Result<()> {
        Self::spec(store)?;

        let tx = self.db.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE store = ?1 AND id = ?2",
            rusqlite::params![store, id],
        )?;
        tx.execute(
            "DELETE FROM records WHERE store = ?1 AND id = ?2",
            rusqlite::params![store, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Full scan of a store. No ordering contract.
    pub fn scan(&self, store: &str) -> Result<Vec<Value>> {
        Self::spec(store)?;

        let mut stmt = self
            .db
            .prepare("SELECT data_json FROM records WHERE store = ?1")?;

        let rows = stmt.query_map([store], |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for row_result in rows {
            let data_json = row_result?;
            results.push(serde_json::from_str(&data_json)?);
        }
        Ok(results)
    }

    /// Count records in a store.
    pub fn count(&self, store: &str) -> Result<u64> {
        Self::spec(store)?;

        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM records WHERE store = ?1",
            [store],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Query a store on its indexed fields.
    ///
    /// Every filter field must be one of the store's registered indexes;
    /// filtering on an unindexed field is an engine error, not an empty
    /// result.
    pub fn query(&self, store: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        let spec = Self::spec(store)?;

        if filters.is_empty() {
            return self.scan(store);
        }

        for filter in filters {
            if !spec.indexes.iter().any(|i| i.field == filter.field) {
                return Err(StoreError::Engine(format!(
                    "field '{}' is not indexed on store '{}'",
                    filter.field, store
                )));
            }
        }

        let mut query = String::from(
            "SELECT DISTINCT r.data_json
             FROM records r
             WHERE r.store = ?1",
        );

        for (i, filter) in filters.iter().enumerate() {
            let join_alias = format!("idx{}", i);
            query.push_str(&format!(
                " AND EXISTS (
                    SELECT 1 FROM record_indexes {}
                    WHERE {}.store = r.store
                      AND {}.id = r.id
                      AND {}.field_name = ?{}",
                join_alias,
                join_alias,
                join_alias,
                join_alias,
                i + 2
            ));

            let value_column = match &filter.value {
                IndexValue::String(_) => "field_value_str",
                IndexValue::Int(_) => "field_value_int",
                IndexValue::Bool(_) => "field_value_bool",
            };
            query.push_str(&format!(
                " AND {}.{} {} ?{}",
                join_alias,
                value_column,
                filter.op.to_sql(),
                i + 2 + filters.len()
            ));

            query.push(')');
        }

        let mut stmt = self.db.prepare(&query)?;

        // Bind parameters: store, then field names, then values
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        params.push(Box::new(store.to_string()));

        for filter in filters {
            params.push(Box::new(filter.field.clone()));
        }

        for filter in filters {
            match (&filter.op, &filter.value) {
                (FilterOp::Contains, IndexValue::String(s)) => {
                    params.push(Box::new(format!("%{}%", s)));
                }
                (_, IndexValue::String(s)) => params.push(Box::new(s.clone())),
                (_, IndexValue::Int(i)) => params.push(Box::new(*i)),
                (_, IndexValue::Bool(b)) => params.push(Box::new(*b as i64)),
            }
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for row_result in rows {
            let data_json = row_result?;
            results.push(serde_json::from_str(&data_json)?);
        }

        Ok(results)
    }

    /// Remove every record from one store.
    pub fn clear(&mut self, store: &str) -> Result<()> {
        Self::spec(store)?;

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM record_indexes WHERE store = ?1", [store])?;
        tx.execute("DELETE FROM records WHERE store = ?1", [store])?;
        tx.commit()?;

        warn!(store, "Cleared store");
        Ok(())
    }

    /// Remove every record from every store. Used by tests and reset flows.
    pub fn erase_all(&mut self) -> Result<()> {
        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM record_indexes", [])?;
        tx.execute("DELETE FROM records", [])?;
        tx.commit()?;

        warn!("Erased all stores");
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn update_indexes_tx(
        tx: &rusqlite::Transaction,
        spec: &StoreSpec,
        id: &str,
        value: &Value,
    ) -> Result<()> {
        tx.execute(
            "DELETE FROM record_indexes WHERE store = ?1 AND id = ?2",
            rusqlite::params![spec.name, id],
        )?;

        for index in spec.indexes {
            let field_value = match value.get(index.field).and_then(IndexValue::from_json) {
                Some(v) => v,
                None => continue,
            };

            debug!(store = spec.name, id, field = index.field, "Indexing field");

            match field_value {
                IndexValue::String(s) => {
                    tx.execute(
                        "INSERT INTO record_indexes (store, id, field_name, field_value_str, field_value_int, field_value_bool)
                         VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
                        rusqlite::params![spec.name, id, index.field, s],
                    )?;
                }
                IndexValue::Int(i) => {
                    tx.execute(
                        "INSERT INTO record_indexes (store, id, field_name, field_value_str, field_value_int, field_value_bool)
                         VALUES (?1, ?2, ?3, NULL, ?4, NULL)",
                        rusqlite::params![spec.name, id, index.field, i],
                    )?;
                }
                IndexValue::Bool(b) => {
                    tx.execute(
                        "INSERT INTO record_indexes (store, id, field_name, field_value_str, field_value_int, field_value_bool)
                         VALUES (?1, ?2, ?3, NULL, NULL, ?4)",
                        rusqlite::params![spec.name, id, index.field, b as i64],
                    )?;
                }
            }
        }

        Ok(())
    }

    fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(StoreError::validation(
                "record id cannot be empty or whitespace-only",
            ));
        }
        if id.len() > 256 {
            return Err(StoreError::validation(format!(
                "record id too long: {} chars (max 256)",
                id.len()
            )));
        }
        Ok(())
    }
}

/// Current timestamp in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before Unix epoch")
        .as_millis() as i64
}
