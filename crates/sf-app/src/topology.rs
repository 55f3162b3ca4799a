//! Network topology loading from a result store.
//!
//! One bulk query per element kind. Nodes load first so edges can resolve
//! their endpoint names; an edge whose endpoints do not resolve is skipped
//! and reported, and the load continues.

use std::ops::ControlFlow;

use rusqlite::Row;
use sf_core::ManualId;
use sf_graph::{
    BuildType, CapacityDetail, CapacityKind, EdgeDraft, EntityFamily, Network, NetworkBuilder,
    NodeDraft, Position, ProfileShape,
};
use sf_results::decode_coordinate;
use sf_store::{
    EdgeColumns, HandleKey, NodeColumns, PositionColumns, ResultStore, StoreError, StoreResult,
};
use tracing::{debug, info, warn};

use crate::error::AppResult;

/// Maps a stored coordinate into the caller's reference system.
pub type CoordinateTransform = Box<dyn Fn(f64, f64) -> (f64, f64) + Send + Sync>;

/// Why an entity was left out of the network.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntity {
    pub family: EntityFamily,
    pub manual_id: ManualId,
    pub reason: String,
}

/// What a topology load dropped along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub skipped: Vec<SkippedEntity>,
    /// Tables absent from this store.
    pub missing_tables: Vec<String>,
}

impl LoadReport {
    pub fn skipped_edges(&self) -> impl Iterator<Item = &SkippedEntity> {
        self.skipped
            .iter()
            .filter(|s| s.family == EntityFamily::Edges)
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.missing_tables.is_empty()
    }
}

struct NodeRows {
    drafts: Vec<NodeDraft>,
    /// Nodes whose position could not be read.
    malformed: Vec<(ManualId, String)>,
}

struct RawEdge {
    manual_id: ManualId,
    name: String,
    upper_node: String,
    lower_node: String,
    upper_level: f64,
    lower_level: f64,
    length: Option<f64>,
    diameter_mm: f64,
}

pub struct TopologyLoader<'a> {
    store: &'a ResultStore,
    normalize_orientation: bool,
    transform: Option<CoordinateTransform>,
}

impl<'a> TopologyLoader<'a> {
    pub fn new(store: &'a ResultStore) -> Self {
        Self {
            store,
            normalize_orientation: true,
            transform: None,
        }
    }

    pub fn normalize_orientation(mut self, on: bool) -> Self {
        self.normalize_orientation = on;
        self
    }

    pub fn with_transform(mut self, transform: CoordinateTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn load(&self) -> AppResult<(Network, LoadReport)> {
        let mut builder = NetworkBuilder::new().normalize_orientation(self.normalize_orientation);
        let mut report = LoadReport::default();
        let columns = self.store.columns();

        for (kind, cols) in &columns.nodes {
            let Some(rows) = self.tolerate_missing(cols.table, &mut report, |s| {
                s.read_nodes(*kind, cols)
            })?
            else {
                continue;
            };
            for (manual_id, reason) in rows.malformed {
                self.skip(&mut report, EntityFamily::Nodes, manual_id, reason);
            }
            for draft in rows.drafts {
                let manual_id = draft.manual_id;
                if let Err(err) = builder.add_node(draft) {
                    self.skip(&mut report, EntityFamily::Nodes, manual_id, err.to_string());
                }
            }
        }

        for (build_type, cols) in &columns.edges {
            let Some(raws) =
                self.tolerate_missing(cols.table, &mut report, |s| s.read_edges(cols))?
            else {
                continue;
            };
            for raw in raws {
                self.add_edge(&mut builder, &mut report, *build_type, raw);
            }
        }

        let network = builder.build()?;
        info!(
            variant = ?self.store.variant(),
            nodes = network.nodes().len(),
            edges = network.edges().len(),
            profiles = network.profiles().len(),
            skipped = report.skipped.len(),
            "loaded network topology"
        );
        Ok((network, report))
    }

    /// A table the variant names but this store lacks is reported, not fatal.
    fn tolerate_missing<T>(
        &self,
        table: &'static str,
        report: &mut LoadReport,
        read: impl FnOnce(&Self) -> StoreResult<T>,
    ) -> AppResult<Option<T>> {
        match read(self) {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::SchemaMismatch { message, .. }) if message.contains("no such table") => {
                debug!(table, "table absent from store");
                if !report.missing_tables.iter().any(|t| t == table) {
                    report.missing_tables.push(table.to_string());
                }
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn skip(&self, report: &mut LoadReport, family: EntityFamily, manual_id: ManualId, reason: String) {
        warn!(?family, %manual_id, %reason, "skipping entity");
        self.store.metrics().record_skipped_entity();
        report.skipped.push(SkippedEntity {
            family,
            manual_id,
            reason,
        });
    }

    fn read_nodes(&self, kind: CapacityKind, cols: &NodeColumns) -> StoreResult<NodeRows> {
        let mut drafts = Vec::new();
        let mut malformed = Vec::new();
        self.store.for_each_row(
            HandleKey::Bulk(EntityFamily::Nodes),
            cols.table,
            &cols.select_sql(),
            [],
            |row| {
                let manual_id = ManualId(row.get(0)?);
                let name: String = row.get(1)?;
                let position = match self.read_position(row, cols.position) {
                    Ok(p) => p,
                    Err(e) => {
                        malformed.push((manual_id, e.to_string()));
                        return Ok(ControlFlow::Continue(()));
                    }
                };
                let sole_at = 2 + cols.position_width();
                let sole: f64 = row.get::<_, Option<f64>>(sole_at)?.unwrap_or(0.0);
                let extra = |i: usize| row.get::<_, Option<f64>>(sole_at + 1 + i);
                let detail = match kind {
                    CapacityKind::Manhole => {
                        let top = extra(0)?.unwrap_or(sole);
                        CapacityDetail::Manhole {
                            top_height: top,
                            surface_height: extra(1)?.unwrap_or(top),
                            shape: extra(2)?
                                .filter(|d| *d > 0.0)
                                .map(ProfileShape::circular_mm),
                        }
                    }
                    CapacityKind::StorageNode => CapacityDetail::StorageNode {
                        volume: extra(0)?.unwrap_or(0.0),
                    },
                    CapacityKind::InfiltrationNode => CapacityDetail::InfiltrationNode {
                        infiltration_rate: extra(0)?.unwrap_or(0.0),
                    },
                    CapacityKind::Outlet => CapacityDetail::Outlet {
                        boundary_level: extra(0)?,
                    },
                };
                drafts.push(NodeDraft {
                    manual_id,
                    name,
                    position,
                    sole_height: sole,
                    detail,
                });
                Ok(ControlFlow::Continue(()))
            },
        )?;

        debug!(?kind, count = drafts.len(), malformed = malformed.len(), "read nodes");
        Ok(NodeRows { drafts, malformed })
    }

    fn read_position(&self, row: &Row<'_>, cols: PositionColumns) -> StoreResult<Position> {
        let (x, y) = match cols {
            PositionColumns::Xy { .. } => (row.get(2)?, row.get(3)?),
            PositionColumns::Blob(_) => {
                let bytes: Vec<u8> = row.get(2)?;
                decode_coordinate(&bytes).map_err(|e| StoreError::MalformedBlob {
                    entity: format!("node {}", row.get::<_, i64>(0).unwrap_or_default()),
                    message: e.to_string(),
                })?
            }
        };
        let position = Position::new(x, y);
        Ok(match &self.transform {
            Some(f) => position.transformed(f),
            None => position,
        })
    }

    fn read_edges(&self, cols: &EdgeColumns) -> StoreResult<Vec<RawEdge>> {
        self.store.query_rows(
            HandleKey::Bulk(EntityFamily::Edges),
            cols.table,
            &cols.select_sql(),
            [],
            |row| {
                Ok(RawEdge {
                    manual_id: ManualId(row.get(0)?),
                    name: row.get(1)?,
                    upper_node: row.get(2)?,
                    lower_node: row.get(3)?,
                    upper_level: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    lower_level: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    length: row.get(6)?,
                    diameter_mm: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
                })
            },
        )
    }

    fn add_edge(
        &self,
        builder: &mut NetworkBuilder,
        report: &mut LoadReport,
        build_type: BuildType,
        raw: RawEdge,
    ) {
        let resolve = |name: &str| {
            builder.node_by_name(name).ok_or_else(|| StoreError::EntityNotResolved {
                name: name.to_string(),
            })
        };
        let endpoints = resolve(&raw.upper_node).and_then(|u| Ok((u, resolve(&raw.lower_node)?)));
        let (upper, lower) = match endpoints {
            Ok(ends) => ends,
            Err(err) => {
                self.skip(report, EntityFamily::Edges, raw.manual_id, err.to_string());
                return;
            }
        };

        let mut draft = EdgeDraft::new(
            raw.manual_id,
            raw.name,
            build_type,
            upper,
            raw.upper_level,
            lower,
            raw.lower_level,
            ProfileShape::circular_mm(raw.diameter_mm),
        );
        draft.length = raw.length;
        if let Err(err) = builder.add_edge(draft) {
            self.skip(report, EntityFamily::Edges, raw.manual_id, err.to_string());
        }
    }
}
