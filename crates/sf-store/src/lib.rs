//! sf-store: physical access to simulator result stores.
//!
//! Provides:
//! - A growing pool of lockable resource handles keyed by the entity they last served
//! - Schema variant detection and the column tables of both store families
//! - Read-only relational result store access over pooled SQLite connections
//! - Geodata feature tables and the indexless id search over them

pub mod error;
pub mod geodata;
pub mod pool;
pub mod relational;
pub mod schema;
pub mod search;

pub use error::{StoreError, StoreResult};
pub use geodata::{
    Feature, FeatureTable, FieldValue, GeodataStore, MemoryFeatureTable, SqliteFeatureTable,
};
pub use pool::{PooledHandle, ResourceHandlePool};
pub use relational::{HandleKey, ResultStore, StoreOptions, StoreSession};
pub use schema::{
    ColumnTable, EdgeColumns, HydrographColumns, MaterialColumns, NodeColumns, PositionColumns,
    ResultColumns, SchemaVariant,
};
pub use search::{DEFAULT_MAX_TRIES, IndexlessTableSearch};
