//! Geodata feature tables holding per-triangle surface results.
//!
//! A feature table exposes features by 1-based position only. Lookups by
//! triangle id go through [`IndexlessTableSearch`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use sf_core::LoadMetrics;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::pool::ResourceHandlePool;
use crate::search::IndexlessTableSearch;

/// One field of a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Real(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for FieldValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => FieldValue::Null,
            ValueRef::Integer(v) => FieldValue::Integer(v),
            ValueRef::Real(v) => FieldValue::Real(v),
            ValueRef::Text(t) => FieldValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => FieldValue::Blob(b.to_vec()),
        }
    }
}

/// A feature read at a 1-based table position.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub position: usize,
    pub fields: Vec<FieldValue>,
}

impl Feature {
    /// 0-based index of the feature.
    pub fn index(&self) -> usize {
        self.position - 1
    }

    pub fn field(&self, i: usize) -> Option<&FieldValue> {
        self.fields.get(i)
    }
}

/// Positional access to an external feature table.
pub trait FeatureTable: Send {
    fn feature_count(&self) -> usize;

    fn read_field_value(&mut self, position: usize, field: usize) -> StoreResult<FieldValue>;

    fn read_feature(&mut self, position: usize) -> StoreResult<Feature>;
}

fn out_of_range(position: usize, field: usize, count: usize) -> StoreError {
    StoreError::FieldType {
        position,
        field,
        message: format!("position outside 1..={count}"),
    }
}

/// Features held in memory, counting every positional read.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeatureTable {
    rows: Vec<Vec<FieldValue>>,
    reads: usize,
}

impl MemoryFeatureTable {
    pub fn new(rows: Vec<Vec<FieldValue>>) -> Self {
        Self { rows, reads: 0 }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn row(&mut self, position: usize, field: usize) -> StoreResult<&Vec<FieldValue>> {
        self.reads += 1;
        let count = self.rows.len();
        position
            .checked_sub(1)
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| out_of_range(position, field, count))
    }
}

impl FeatureTable for MemoryFeatureTable {
    fn feature_count(&self) -> usize {
        self.rows.len()
    }

    fn read_field_value(&mut self, position: usize, field: usize) -> StoreResult<FieldValue> {
        self.row(position, field)?
            .get(field)
            .cloned()
            .ok_or_else(|| StoreError::FieldType {
                position,
                field,
                message: "no such field".to_string(),
            })
    }

    fn read_feature(&mut self, position: usize) -> StoreResult<Feature> {
        let fields = self.row(position, 0)?.clone();
        Ok(Feature { position, fields })
    }
}

/// A table inside an SQLite file, read by row offset only.
pub struct SqliteFeatureTable {
    conn: Connection,
    table: String,
    columns: Vec<String>,
    count: usize,
}

impl SqliteFeatureTable {
    pub fn open(path: &Path, table: &str) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::ResourceCreation {
            what: format!("{} ({table})", path.display()),
            message: e.to_string(),
        })?;

        let columns = {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<Result<Vec<_>, _>>()?;
            names
        };
        if columns.is_empty() {
            return Err(StoreError::SchemaMismatch {
                table: table.to_string(),
                message: "feature table has no columns".to_string(),
            });
        }

        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;

        Ok(Self {
            conn,
            table: table.to_string(),
            columns,
            count: count.max(0) as usize,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn offset(&self, position: usize, field: usize) -> StoreResult<i64> {
        if position == 0 || position > self.count {
            return Err(out_of_range(position, field, self.count));
        }
        Ok(position as i64 - 1)
    }
}

impl FeatureTable for SqliteFeatureTable {
    fn feature_count(&self) -> usize {
        self.count
    }

    fn read_field_value(&mut self, position: usize, field: usize) -> StoreResult<FieldValue> {
        let offset = self.offset(position, field)?;
        let column = self.columns.get(field).ok_or_else(|| StoreError::FieldType {
            position,
            field,
            message: "no such field".to_string(),
        })?;
        let sql = format!(
            "SELECT \"{column}\" FROM \"{}\" ORDER BY rowid LIMIT 1 OFFSET ?1",
            self.table
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let value = stmt.query_row([offset], |row| Ok(FieldValue::from(row.get_ref(0)?)))?;
        Ok(value)
    }

    fn read_feature(&mut self, position: usize) -> StoreResult<Feature> {
        let offset = self.offset(position, 0)?;
        let sql = format!(
            "SELECT * FROM \"{}\" ORDER BY rowid LIMIT 1 OFFSET ?1",
            self.table
        );
        let width = self.columns.len();
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let fields = stmt.query_row([offset], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(FieldValue::from))
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok(Feature { position, fields })
    }
}

/// Surface results of one geodata table, addressed by triangle id.
///
/// Table handles are pooled per triangle id, so concurrent lookups of one
/// triangle serialize and lookups of different triangles do not.
pub struct GeodataStore<T> {
    pool: ResourceHandlePool<T, i64>,
    search: IndexlessTableSearch,
    value_fields: Vec<usize>,
    metrics: Arc<LoadMetrics>,
}

impl<T: FeatureTable + 'static> GeodataStore<T> {
    /// `value_fields` are the field indices of the per-timestep values.
    pub fn new(
        factory: impl Fn() -> StoreResult<T> + Send + Sync + 'static,
        search: IndexlessTableSearch,
        value_fields: Vec<usize>,
        metrics: Arc<LoadMetrics>,
    ) -> Self {
        Self {
            pool: ResourceHandlePool::new(factory, metrics.clone()),
            search,
            value_fields,
            metrics,
        }
    }

    /// Cap the probes of every lookup.
    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.search = self.search.with_max_tries(max_tries);
        self
    }

    pub fn search(&self) -> &IndexlessTableSearch {
        &self.search
    }

    pub fn series_len(&self) -> usize {
        self.value_fields.len()
    }

    pub fn handle_count(&self) -> usize {
        self.pool.handle_count()
    }

    /// The triangle's values in field order. Null fields read as zero.
    pub fn series(&self, triangle_id: i64) -> StoreResult<Vec<f64>> {
        let mut table = self.pool.acquire(triangle_id)?;
        let feature = self.search.find(&mut *table, triangle_id, &self.metrics)?;
        debug!(triangle_id, position = feature.position, "located surface feature");
        Ok(self
            .value_fields
            .iter()
            .map(|&i| feature.field(i).and_then(FieldValue::as_f64).unwrap_or(0.0))
            .collect())
    }

    pub fn close(&self) -> StoreResult<usize> {
        self.pool.close()
    }
}

impl GeodataStore<SqliteFeatureTable> {
    /// Open an SQLite geodata table; the id sits in column `id_column` and
    /// every column named in `value_columns` is one timestep.
    pub fn open_sqlite(
        path: impl Into<PathBuf>,
        table: &str,
        id_column: &str,
        value_columns: &[&str],
        max_id: i64,
        metrics: Arc<LoadMetrics>,
    ) -> StoreResult<Self> {
        let path = path.into();
        let probe = SqliteFeatureTable::open(&path, table)?;
        let index_of = |name: &str| {
            probe
                .columns()
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| StoreError::SchemaMismatch {
                    table: table.to_string(),
                    message: format!("no such column: {name}"),
                })
        };
        let id_field = index_of(id_column)?;
        let value_fields = value_columns
            .iter()
            .map(|&c| index_of(c))
            .collect::<StoreResult<Vec<_>>>()?;

        let table_name = table.to_string();
        Ok(Self::new(
            move || SqliteFeatureTable::open(&path, &table_name),
            IndexlessTableSearch::new(id_field, max_id),
            value_fields,
            metrics,
        ))
    }
}
