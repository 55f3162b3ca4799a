//! Store error types.

use sf_results::ResultsError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while reaching into a result store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A physical connection or table handle could not be opened.
    #[error("Could not open {what}: {message}")]
    ResourceCreation { what: String, message: String },

    /// A query did not fit the selected schema variant.
    #[error("Schema mismatch on table {table}: {message}")]
    SchemaMismatch { table: String, message: String },

    /// A referenced node name has no loaded entity.
    #[error("Entity not resolved: {name}")]
    EntityNotResolved { name: String },

    /// A stored blob violates its binary layout.
    #[error("Malformed blob for {entity}: {message}")]
    MalformedBlob { entity: String, message: String },

    /// No feature holds the requested id.
    #[error("Feature with id {id} not found")]
    NotFound { id: i64 },

    #[error("Timed out after {waited_ms} ms waiting for {what}")]
    Timeout { what: &'static str, waited_ms: u64 },

    #[error("Resource pool is closed")]
    PoolClosed,

    #[error("Lock poisoned: {0}")]
    Poisoned(String),

    #[error("Field {field} at position {position}: {message}")]
    FieldType {
        position: usize,
        field: usize,
        message: String,
    },

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Whether the caller should treat this as "no data" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
