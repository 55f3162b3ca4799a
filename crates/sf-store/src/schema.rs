//! Schema variants of the result store.
//!
//! Two store families describe the same concepts with different table
//! layouts. The variant is picked once per store by probing a marker table;
//! afterwards every query is assembled from the variant's [`ColumnTable`].
//!
//! Legacy stores keep all nodes in one table (and all edges in another) with
//! an integer type discriminator, plain X/Y columns, and discharge in l/s.
//! Current stores use one table per element kind, coordinate blobs, and
//! discharge in m³/s.

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sf_graph::{BuildType, CapacityKind};
use tracing::info;

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    Legacy,
    Current,
}

/// How a node table stores positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionColumns {
    Xy { x: &'static str, y: &'static str },
    Blob(&'static str),
}

/// Columns of one node kind.
///
/// `extra` lists kind-specific columns in this order:
/// manhole `[top, surface, diameter_mm]`, storage `[volume]`,
/// infiltration `[rate]`, outlet `[boundary_level]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeColumns {
    pub table: &'static str,
    pub filter: Option<(&'static str, i64)>,
    pub id: &'static str,
    pub name: &'static str,
    pub position: PositionColumns,
    pub sole: &'static str,
    pub extra: &'static [&'static str],
}

/// Columns of one edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeColumns {
    pub table: &'static str,
    pub filter: Option<(&'static str, i64)>,
    pub id: &'static str,
    pub name: &'static str,
    pub upper_node: &'static str,
    pub lower_node: &'static str,
    pub upper_level: &'static str,
    pub lower_level: &'static str,
    pub length: &'static str,
    pub diameter_mm: &'static str,
}

/// A per-(entity, time) result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultColumns {
    pub table: &'static str,
    pub id: &'static str,
    pub time: &'static str,
    pub values: &'static [&'static str],
}

/// Per-(entity, material, time) transport results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialColumns {
    pub table: &'static str,
    pub id: &'static str,
    pub time: &'static str,
    pub material: &'static str,
    pub flux: &'static str,
    pub concentration: &'static str,
}

/// Irregular inflow series stored as blobs, one per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrographColumns {
    pub table: &'static str,
    pub id: &'static str,
    pub series: &'static str,
}

/// All table and column names of one schema variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnTable {
    pub marker: &'static str,
    pub nodes: [(CapacityKind, NodeColumns); 4],
    pub edges: [(BuildType, EdgeColumns); 4],
    /// Values: velocity, discharge, water level.
    pub edge_results: ResultColumns,
    /// Values: water level, spill.
    pub node_results: ResultColumns,
    pub materials: MaterialColumns,
    pub hydrographs: HydrographColumns,
    /// Factor from stored discharge to m³/s.
    pub discharge_scale: f64,
}

const LEGACY_NODE_EXTRA: [&[&str]; 4] = [&["TOP", "GROUND", "DIAM"], &["VOLUME"], &["RATE"], &["BOUNDARY"]];

const fn legacy_node(code: i64, extra: &'static [&'static str]) -> NodeColumns {
    NodeColumns {
        table: "NODES",
        filter: Some(("NODE_TYPE", code)),
        id: "NODE_ID",
        name: "NODE_NAME",
        position: PositionColumns::Xy {
            x: "XCOORD",
            y: "YCOORD",
        },
        sole: "SOLE",
        extra,
    }
}

const fn legacy_edge(code: i64) -> EdgeColumns {
    EdgeColumns {
        table: "EDGES",
        filter: Some(("EDGE_TYPE", code)),
        id: "EDGE_ID",
        name: "EDGE_NAME",
        upper_node: "FROM_NODE",
        lower_node: "TO_NODE",
        upper_level: "FROM_LEVEL",
        lower_level: "TO_LEVEL",
        length: "LEN",
        diameter_mm: "DIAM",
    }
}

const fn current_node(table: &'static str, extra: &'static [&'static str]) -> NodeColumns {
    NodeColumns {
        table,
        filter: None,
        id: "Id",
        name: "Name",
        position: PositionColumns::Blob("Geometry"),
        sole: "SoleLevel",
        extra,
    }
}

const fn current_edge(table: &'static str) -> EdgeColumns {
    EdgeColumns {
        table,
        filter: None,
        id: "Id",
        name: "Name",
        upper_node: "UpperNode",
        lower_node: "LowerNode",
        upper_level: "UpperLevel",
        lower_level: "LowerLevel",
        length: "Length",
        diameter_mm: "Diameter",
    }
}

static LEGACY: ColumnTable = ColumnTable {
    marker: "NODES",
    nodes: [
        (CapacityKind::Manhole, legacy_node(0, LEGACY_NODE_EXTRA[0])),
        (CapacityKind::StorageNode, legacy_node(1, LEGACY_NODE_EXTRA[1])),
        (CapacityKind::InfiltrationNode, legacy_node(2, LEGACY_NODE_EXTRA[2])),
        (CapacityKind::Outlet, legacy_node(3, LEGACY_NODE_EXTRA[3])),
    ],
    edges: [
        (BuildType::Pipe, legacy_edge(0)),
        (BuildType::Pump, legacy_edge(1)),
        (BuildType::Choke, legacy_edge(2)),
        (BuildType::Weir, legacy_edge(3)),
    ],
    edge_results: ResultColumns {
        table: "EDGE_RESULTS",
        id: "EDGE_ID",
        time: "TIMESTEP",
        values: &["VEL", "FLOW", "LEVEL"],
    },
    node_results: ResultColumns {
        table: "NODE_RESULTS",
        id: "NODE_ID",
        time: "TIMESTEP",
        values: &["LEVEL", "SPILL"],
    },
    materials: MaterialColumns {
        table: "MATERIAL_RESULTS",
        id: "EDGE_ID",
        time: "TIMESTEP",
        material: "MATERIAL",
        flux: "FLUX",
        concentration: "CONC",
    },
    hydrographs: HydrographColumns {
        table: "HYDROGRAPHS",
        id: "NODE_ID",
        series: "SERIES",
    },
    discharge_scale: sf_core::LPS_TO_M3PS,
};

static CURRENT: ColumnTable = ColumnTable {
    marker: "Manhole",
    nodes: [
        (
            CapacityKind::Manhole,
            current_node("Manhole", &["TopLevel", "SurfaceLevel", "Diameter"]),
        ),
        (
            CapacityKind::StorageNode,
            current_node("StorageNode", &["Volume"]),
        ),
        (
            CapacityKind::InfiltrationNode,
            current_node("InfiltrationNode", &["InfiltrationRate"]),
        ),
        (
            CapacityKind::Outlet,
            current_node("Outlet", &["BoundaryLevel"]),
        ),
    ],
    edges: [
        (BuildType::Pipe, current_edge("Pipe")),
        (BuildType::Pump, current_edge("Pump")),
        (BuildType::Choke, current_edge("Regulator")),
        (BuildType::Weir, current_edge("Weir")),
    ],
    edge_results: ResultColumns {
        table: "EdgeResult",
        id: "Id",
        time: "Time",
        values: &["Velocity", "Discharge", "WaterLevel"],
    },
    node_results: ResultColumns {
        table: "NodeResult",
        id: "Id",
        time: "Time",
        values: &["WaterLevel", "Spill"],
    },
    materials: MaterialColumns {
        table: "EdgeMaterialResult",
        id: "Id",
        time: "Time",
        material: "Material",
        flux: "Flux",
        concentration: "Concentration",
    },
    hydrographs: HydrographColumns {
        table: "Hydrograph",
        id: "Id",
        series: "Series",
    },
    discharge_scale: 1.0,
};

impl SchemaVariant {
    /// Probe order: newer family first.
    pub const PROBE_ORDER: [SchemaVariant; 2] = [SchemaVariant::Current, SchemaVariant::Legacy];

    pub fn columns(self) -> &'static ColumnTable {
        match self {
            SchemaVariant::Legacy => &LEGACY,
            SchemaVariant::Current => &CURRENT,
        }
    }

    /// Pick the variant whose marker table exists.
    pub fn detect(conn: &Connection) -> StoreResult<SchemaVariant> {
        for variant in Self::PROBE_ORDER {
            let marker = variant.columns().marker;
            let found: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [marker],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_some() {
                info!(?variant, marker, "detected store schema");
                return Ok(variant);
            }
        }
        Err(StoreError::SchemaMismatch {
            table: "sqlite_master".to_string(),
            message: "neither schema family's marker table exists".to_string(),
        })
    }
}

impl ColumnTable {
    pub fn node_columns(&self, kind: CapacityKind) -> &NodeColumns {
        &self
            .nodes
            .iter()
            .find(|(k, _)| *k == kind)
            .unwrap_or(&self.nodes[0])
            .1
    }

    pub fn edge_columns(&self, build_type: BuildType) -> &EdgeColumns {
        &self
            .edges
            .iter()
            .find(|(b, _)| *b == build_type)
            .unwrap_or(&self.edges[0])
            .1
    }
}

fn where_clause(filter: Option<(&'static str, i64)>) -> String {
    match filter {
        Some((col, code)) => format!(" WHERE {col} = {code}"),
        None => String::new(),
    }
}

impl NodeColumns {
    /// Select list: id, name, position column(s), sole, extras.
    pub fn select_sql(&self) -> String {
        let position = match self.position {
            PositionColumns::Xy { x, y } => format!("{x}, {y}"),
            PositionColumns::Blob(col) => col.to_string(),
        };
        let mut cols = vec![
            self.id.to_string(),
            self.name.to_string(),
            position,
            self.sole.to_string(),
        ];
        cols.extend(self.extra.iter().map(|c| c.to_string()));
        format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            cols.join(", "),
            self.table,
            where_clause(self.filter),
            self.id
        )
    }

    /// Number of columns the position occupies in the select list.
    pub fn position_width(&self) -> usize {
        match self.position {
            PositionColumns::Xy { .. } => 2,
            PositionColumns::Blob(_) => 1,
        }
    }
}

impl EdgeColumns {
    /// Select list: id, name, upper node, lower node, upper level, lower level, length, diameter.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {} FROM {}{} ORDER BY {}",
            self.id,
            self.name,
            self.upper_node,
            self.lower_node,
            self.upper_level,
            self.lower_level,
            self.length,
            self.diameter_mm,
            self.table,
            where_clause(self.filter),
            self.id
        )
    }
}

impl ResultColumns {
    /// All rows ordered by (id, time).
    pub fn bulk_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {}, {}",
            self.id,
            self.time,
            self.values.join(", "),
            self.table,
            self.id,
            self.time
        )
    }

    /// One entity's rows ordered by time; binds the id as `?1`.
    pub fn entity_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {} FROM {} WHERE {} = ?1 ORDER BY {}",
            self.id,
            self.time,
            self.values.join(", "),
            self.table,
            self.id,
            self.time
        )
    }

    pub fn time_axis_sql(&self) -> String {
        format!(
            "SELECT DISTINCT {} FROM {} ORDER BY {}",
            self.time, self.table, self.time
        )
    }
}

impl MaterialColumns {
    /// One material's rows ordered by (id, time); binds the material as `?1`.
    pub fn bulk_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {}, {} FROM {} WHERE {} = ?1 ORDER BY {}, {}",
            self.id,
            self.time,
            self.flux,
            self.concentration,
            self.table,
            self.material,
            self.id,
            self.time
        )
    }

    /// One entity's rows for one material; binds id `?1`, material `?2`.
    pub fn entity_sql(&self) -> String {
        format!(
            "SELECT {}, {}, {}, {} FROM {} WHERE {} = ?1 AND {} = ?2 ORDER BY {}",
            self.id,
            self.time,
            self.flux,
            self.concentration,
            self.table,
            self.id,
            self.material,
            self.time
        )
    }
}

impl HydrographColumns {
    /// Binds the node id as `?1`.
    pub fn entity_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.series, self.table, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_nodes_filter_by_type() {
        let cols = SchemaVariant::Legacy
            .columns()
            .node_columns(CapacityKind::StorageNode);
        assert_eq!(
            cols.select_sql(),
            "SELECT NODE_ID, NODE_NAME, XCOORD, YCOORD, SOLE, VOLUME FROM NODES WHERE NODE_TYPE = 1 ORDER BY NODE_ID"
        );
        assert_eq!(cols.position_width(), 2);
    }

    #[test]
    fn current_edges_use_own_table() {
        let cols = SchemaVariant::Current
            .columns()
            .edge_columns(BuildType::Choke);
        assert_eq!(cols.table, "Regulator");
        assert!(cols.select_sql().ends_with("FROM Regulator ORDER BY Id"));
    }

    #[test]
    fn result_queries_order_by_id_then_time() {
        let cols = &SchemaVariant::Current.columns().edge_results;
        assert_eq!(
            cols.bulk_sql(),
            "SELECT Id, Time, Velocity, Discharge, WaterLevel FROM EdgeResult ORDER BY Id, Time"
        );
        assert!(cols.entity_sql().contains("WHERE Id = ?1 ORDER BY Time"));
    }

    #[test]
    fn discharge_units_differ() {
        assert_eq!(SchemaVariant::Legacy.columns().discharge_scale, 0.001);
        assert_eq!(SchemaVariant::Current.columns().discharge_scale, 1.0);
    }

    #[test]
    fn detect_prefers_current() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(SchemaVariant::detect(&conn).is_err());
        conn.execute_batch("CREATE TABLE NODES (NODE_ID INTEGER);")
            .unwrap();
        assert_eq!(
            SchemaVariant::detect(&conn).unwrap(),
            SchemaVariant::Legacy
        );
        conn.execute_batch("CREATE TABLE Manhole (Id INTEGER);")
            .unwrap();
        assert_eq!(
            SchemaVariant::detect(&conn).unwrap(),
            SchemaVariant::Current
        );
    }
}
