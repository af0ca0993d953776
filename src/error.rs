// Closed error taxonomy for store operations

use thiserror::Error;

/// Errors surfaced by the store.
///
/// Callers branch on the variant rather than matching message text: a
/// `Validation` error means nothing was written, `NotFound` means the
/// identifier did not resolve, `Constraint` means a strict insert hit an
/// existing key, `Engine` wraps the underlying database failure, and
/// `Decode` means a backup payload could not be read.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A required field was missing or a field value was malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The record identifier did not resolve to a stored record.
    #[error("not found: {kind} '{id}'")]
    NotFound { kind: &'static str, id: String },

    /// A strict insert collided with an existing primary key.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The underlying database failed to open or run a transaction.
    #[error("storage engine error: {0}")]
    Engine(String),

    /// A shareable backup payload was not valid base64/JSON.
    #[error("backup decode failed: {0}")]
    Decode(String),
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound { kind, id: id.into() }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // SQLite reports primary-key collisions as constraint violations;
        // everything else is an engine failure.
        if let rusqlite::Error::SqliteFailure(e, ref msg) = err {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Constraint(
                    msg.clone().unwrap_or_else(|| e.to_string()),
                );
            }
        }
        StoreError::Engine(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Engine(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Engine(err.to_string())
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
