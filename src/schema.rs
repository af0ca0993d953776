// Static schema registry: store names, primary keys, secondary indexes

/// Current schema version, stored in SQLite's `user_version` pragma.
///
/// Bumping this is the only sanctioned way to add stores or indexes to an
/// existing database; the engine runs the upgrade DDL exactly once when it
/// finds a lower stored version.
pub const SCHEMA_VERSION: i32 = 1;

pub const CLIENTS: &str = "clients";
pub const ESTIMATES: &str = "estimates";
pub const INVOICES: &str = "invoices";

/// A non-unique secondary index over one top-level record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Field name as it appears in the serialized record (camelCase).
    pub field: &'static str,
}

/// Immutable description of one record store.
#[derive(Debug, Clone, Copy)]
pub struct StoreSpec {
    /// Store name, also the `collection` value in the records table.
    pub name: &'static str,
    /// Primary key field within the serialized record.
    pub key_field: &'static str,
    /// Secondary indexes maintained on every write.
    pub indexes: &'static [IndexSpec],
}

const STORES: &[StoreSpec] = &[
    StoreSpec {
        name: CLIENTS,
        key_field: "id",
        indexes: &[
            IndexSpec { field: "name" },
            IndexSpec { field: "email" },
            IndexSpec { field: "phone" },
        ],
    },
    StoreSpec {
        name: ESTIMATES,
        key_field: "id",
        indexes: &[
            IndexSpec { field: "clientId" },
            IndexSpec { field: "status" },
            IndexSpec { field: "createdAt" },
        ],
    },
    StoreSpec {
        name: INVOICES,
        key_field: "id",
        indexes: &[
            IndexSpec { field: "clientId" },
            IndexSpec { field: "status" },
            IndexSpec { field: "createdAt" },
        ],
    },
];

/// All registered stores. Fixed for the lifetime of the process.
pub fn stores() -> &'static [StoreSpec] {
    STORES
}

/// Look up a store descriptor by name.
pub fn store_spec(name: &str) -> Option<&'static StoreSpec> {
    STORES.iter().find(|s| s.name == name)
}

/// Idempotent DDL for the generic record tables.
///
/// Records are stored as JSON blobs keyed by (store, id); indexed field
/// values are projected into `record_indexes` so filtered queries avoid
/// deserializing every record.
pub const SCHEMA_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        store TEXT NOT NULL,
        id TEXT NOT NULL,
        data_json TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (store, id)
    );

    CREATE INDEX IF NOT EXISTS idx_records_store ON records(store);

    CREATE TABLE IF NOT EXISTS record_indexes (
        store TEXT NOT NULL,
        id TEXT NOT NULL,
        field_name TEXT NOT NULL,
        field_value_str TEXT,
        field_value_int INTEGER,
        field_value_bool INTEGER,
        PRIMARY KEY (store, id, field_name),
        FOREIGN KEY (store, id) REFERENCES records(store, id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_record_indexes_field_str ON record_indexes(store, field_name, field_value_str);
    CREATE INDEX IF NOT EXISTS idx_record_indexes_field_int ON record_indexes(store, field_name, field_value_int);
    CREATE INDEX IF NOT EXISTS idx_record_indexes_field_bool ON record_indexes(store, field_name, field_value_bool);
"#;
