//! Read-only relational result store.
//!
//! Wraps an SQLite file written by the simulator. Every query runs on a
//! pooled connection keyed by what it loads, so per-entity loads of the same
//! entity serialize while different entities proceed in parallel.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Params, Row};
use sf_core::{LoadMetrics, ManualId, Timer};
use sf_graph::EntityFamily;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::pool::{PooledHandle, ResourceHandlePool};
use crate::schema::{ColumnTable, SchemaVariant};

/// What a pooled connection is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKey {
    /// A bulk pass over one family.
    Bulk(EntityFamily),
    /// A point query for one entity.
    Entity(EntityFamily, ManualId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// Skip probing and use this variant.
    pub schema: Option<SchemaVariant>,
    pub busy_timeout: Duration,
    pub acquire_timeout: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            schema: None,
            busy_timeout: Duration::from_millis(5000),
            acquire_timeout: None,
        }
    }
}

pub struct ResultStore {
    path: PathBuf,
    variant: SchemaVariant,
    pool: ResourceHandlePool<Connection, HandleKey>,
    metrics: Arc<LoadMetrics>,
}

impl ResultStore {
    /// Open a store and settle its schema variant.
    pub fn open(
        path: impl AsRef<Path>,
        options: &StoreOptions,
        metrics: Arc<LoadMetrics>,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(StoreError::ResourceCreation {
                what: path.display().to_string(),
                message: "file does not exist".to_string(),
            });
        }

        let busy_timeout = options.busy_timeout;
        let factory_path = path.clone();
        let pool = ResourceHandlePool::new(
            move || open_connection(&factory_path, busy_timeout),
            metrics.clone(),
        )
        .with_acquire_timeout(options.acquire_timeout);

        let variant = match options.schema {
            Some(v) => v,
            None => {
                let conn = pool.acquire(HandleKey::Bulk(EntityFamily::Nodes))?;
                SchemaVariant::detect(&conn)?
            }
        };
        info!(path = %path.display(), ?variant, "opened result store");

        Ok(Self {
            path,
            variant,
            pool,
            metrics,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    pub fn columns(&self) -> &'static ColumnTable {
        self.variant.columns()
    }

    pub fn metrics(&self) -> &Arc<LoadMetrics> {
        &self.metrics
    }

    pub fn handle_count(&self) -> usize {
        self.pool.handle_count()
    }

    /// Lease a connection bound to `key` for several queries.
    ///
    /// Blocks while another caller holds the connection bound to `key`.
    pub fn session(&self, key: HandleKey) -> StoreResult<StoreSession<'_>> {
        Ok(StoreSession {
            conn: self.pool.acquire(key)?,
            metrics: &self.metrics,
        })
    }

    /// Run one query on a connection bound to `key`. See [`StoreSession::for_each_row`].
    pub fn for_each_row<P: Params>(
        &self,
        key: HandleKey,
        table: &str,
        sql: &str,
        params: P,
        f: impl FnMut(&Row<'_>) -> StoreResult<ControlFlow<()>>,
    ) -> StoreResult<u64> {
        self.session(key)?.for_each_row(table, sql, params, f)
    }

    pub fn query_rows<T, P: Params>(
        &self,
        key: HandleKey,
        table: &str,
        sql: &str,
        params: P,
        map: impl FnMut(&Row<'_>) -> StoreResult<T>,
    ) -> StoreResult<Vec<T>> {
        self.session(key)?.query_rows(table, sql, params, map)
    }

    /// Drop idle connections; later queries fail with `PoolClosed`.
    pub fn close(&self) -> StoreResult<()> {
        let dropped = self.pool.close()?;
        info!(path = %self.path.display(), dropped, "closed result store");
        Ok(())
    }
}

/// A leased connection. Dropping it returns the connection to the pool.
pub struct StoreSession<'a> {
    conn: PooledHandle<'a, Connection, HandleKey>,
    metrics: &'a LoadMetrics,
}

impl StoreSession<'_> {
    pub fn key(&self) -> HandleKey {
        *self.conn.key()
    }

    /// Run `sql`, feeding rows to `f` in the order the query returns them.
    ///
    /// Reading stops after the row for which `f` returns
    /// `ControlFlow::Break`. Returns the number of rows visited. `table` names
    /// the queried table in a [`StoreError::SchemaMismatch`].
    pub fn for_each_row<P: Params>(
        &self,
        table: &str,
        sql: &str,
        params: P,
        mut f: impl FnMut(&Row<'_>) -> StoreResult<ControlFlow<()>>,
    ) -> StoreResult<u64> {
        let timer = Timer::start();
        self.metrics.record_query();

        let mut stmt = self.conn.prepare(sql).map_err(|e| schema_error(table, e))?;
        let mut rows = stmt.query(params).map_err(|e| schema_error(table, e))?;
        let mut visited = 0_u64;
        while let Some(row) = rows.next()? {
            visited += 1;
            if f(row)?.is_break() {
                break;
            }
        }

        self.metrics.record_rows(visited);
        timer.stop_into(&self.metrics.query_time);
        debug!(table, rows = visited, key = ?self.key(), "query finished");
        Ok(visited)
    }

    /// Collect one mapped value per row.
    pub fn query_rows<T, P: Params>(
        &self,
        table: &str,
        sql: &str,
        params: P,
        mut map: impl FnMut(&Row<'_>) -> StoreResult<T>,
    ) -> StoreResult<Vec<T>> {
        let mut out = Vec::new();
        self.for_each_row(table, sql, params, |row| {
            out.push(map(row)?);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(out)
    }

    /// First row's blob in column 0, if any row matches.
    pub fn query_blob<P: Params>(
        &self,
        table: &str,
        sql: &str,
        params: P,
    ) -> StoreResult<Option<Vec<u8>>> {
        let timer = Timer::start();
        self.metrics.record_query();
        let blob = self
            .conn
            .query_row(sql, params, |row| row.get::<_, Vec<u8>>(0))
            .optional()
            .map_err(|e| schema_error(table, e))?;
        self.metrics.record_rows(u64::from(blob.is_some()));
        timer.stop_into(&self.metrics.query_time);
        Ok(blob)
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> StoreResult<Connection> {
    let creation = |e: rusqlite::Error| StoreError::ResourceCreation {
        what: path.display().to_string(),
        message: e.to_string(),
    };
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(creation)?;
    conn.busy_timeout(busy_timeout).map_err(creation)?;
    Ok(conn)
}

fn schema_error(table: &str, err: rusqlite::Error) -> StoreError {
    let message = err.to_string();
    if message.contains("no such table") || message.contains("no such column") {
        StoreError::SchemaMismatch {
            table: table.to_string(),
            message,
        }
    } else {
        StoreError::Sqlite(err)
    }
}
