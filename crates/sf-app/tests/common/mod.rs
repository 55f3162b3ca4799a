//! On-disk result store fixtures for both schema families.

#![allow(dead_code)]

use rusqlite::Connection;
use sf_results::{TimedValue, encode_coordinate, encode_time_series};
use tempfile::NamedTempFile;

pub const T0: i64 = 1_700_000_000_000;
pub const T1: i64 = T0 + 60_000;

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-5,
        "expected {expected}, got {actual}"
    );
}

/// Current-family store:
///
/// - manholes 1 MH1, 2 MH2, 3 MH3 and outlet 4 OUT; no infiltration table
/// - pipe 10 MH1→MH2, pipe 30 stored uphill MH3→MH2 without length,
///   pipe 20 to an unknown node, pump 5 MH3→OUT
/// - edge results for 5, 10, 20, 30 and an orphan id 99
pub fn current_store() -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE Manhole (Id INTEGER, Name TEXT, Geometry BLOB, SoleLevel REAL,
                               TopLevel REAL, SurfaceLevel REAL, Diameter REAL);
         CREATE TABLE StorageNode (Id INTEGER, Name TEXT, Geometry BLOB, SoleLevel REAL, Volume REAL);
         CREATE TABLE Outlet (Id INTEGER, Name TEXT, Geometry BLOB, SoleLevel REAL, BoundaryLevel REAL);
         CREATE TABLE Pipe (Id INTEGER, Name TEXT, UpperNode TEXT, LowerNode TEXT,
                            UpperLevel REAL, LowerLevel REAL, Length REAL, Diameter REAL);
         CREATE TABLE Pump AS SELECT * FROM Pipe;
         CREATE TABLE Regulator AS SELECT * FROM Pipe;
         CREATE TABLE Weir AS SELECT * FROM Pipe;
         CREATE TABLE EdgeResult (Id INTEGER, Time INTEGER, Velocity REAL, Discharge REAL, WaterLevel REAL);
         CREATE TABLE NodeResult (Id INTEGER, Time INTEGER, WaterLevel REAL, Spill REAL);
         CREATE TABLE EdgeMaterialResult (Id INTEGER, Time INTEGER, Material INTEGER,
                                          Flux REAL, Concentration REAL);
         CREATE TABLE Hydrograph (Id INTEGER, Series BLOB);",
    )
    .unwrap();

    let nodes: [(i64, &str, f64, f64, f64); 3] = [
        (1, "MH1", 0.0, 0.0, 10.0),
        (2, "MH2", 30.0, 40.0, 9.0),
        (3, "MH3", 60.0, 80.0, 8.0),
    ];
    for (id, name, x, y, sole) in nodes {
        conn.execute(
            "INSERT INTO Manhole VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1000.0)",
            (id, name, encode_coordinate(x, y), sole, sole + 3.0, sole + 3.5),
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO Outlet VALUES (4, 'OUT', ?1, 7.0, NULL)",
        [encode_coordinate(90.0, 120.0)],
    )
    .unwrap();

    conn.execute_batch(
        "INSERT INTO Pipe VALUES (10, 'P10', 'MH1', 'MH2', 10.0, 9.0, 50.0, 300.0);
         INSERT INTO Pipe VALUES (30, 'P30', 'MH3', 'MH2', 8.0, 9.0, NULL, 300.0);
         INSERT INTO Pipe VALUES (20, 'P20', 'MH2', 'GHOST', 9.0, 8.0, 10.0, 300.0);
         INSERT INTO Pump VALUES (5, 'PU5', 'MH3', 'OUT', 8.0, 7.0, NULL, 200.0);",
    )
    .unwrap();

    let edge_rows: [(i64, i64, f64, f64, f64); 8] = [
        (5, T0, 0.0, 0.2, 8.1),
        (5, T1, 0.0, 0.0, 8.2),
        (10, T0, 1.0, 0.5, 9.5),
        (10, T1, 1.2, 0.6, 9.6),
        (20, T0, 9.0, 9.0, 9.0),
        (30, T0, 0.8, 0.4, 8.5),
        (99, T0, 7.0, 7.0, 7.0),
        (99, T1, 7.0, 7.0, 7.0),
    ];
    for row in edge_rows {
        conn.execute("INSERT INTO EdgeResult VALUES (?1, ?2, ?3, ?4, ?5)", row)
            .unwrap();
    }

    conn.execute_batch(&format!(
        "INSERT INTO NodeResult VALUES (1, {T0}, 10.2, 0.0);
         INSERT INTO NodeResult VALUES (1, {T1}, 10.4, 0.0);
         INSERT INTO NodeResult VALUES (3, {T1}, 8.9, 0.003);
         INSERT INTO EdgeMaterialResult VALUES (10, {T0}, 1, 2.0, 150.0);
         INSERT INTO EdgeMaterialResult VALUES (10, {T1}, 1, 3.0, 200.0);
         INSERT INTO EdgeMaterialResult VALUES (10, {T0}, 2, 5.0, 1.0);
         INSERT INTO Hydrograph VALUES (2, x'0102');"
    ))
    .unwrap();

    conn.execute(
        "INSERT INTO Hydrograph VALUES (1, ?1)",
        [encode_time_series(&[
            TimedValue::new(T0, 1.5),
            TimedValue::new(T1, 2.25),
        ])],
    )
    .unwrap();

    file
}

/// Legacy-family store: one node table, one edge table, discharge in l/s.
///
/// Manholes 1 A and 2 B, outlet 3 C; pipe 7 A→B, weir 8 B→C.
pub fn legacy_store() -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE NODES (NODE_ID INTEGER, NODE_NAME TEXT, NODE_TYPE INTEGER,
                             XCOORD REAL, YCOORD REAL, SOLE REAL, TOP REAL, GROUND REAL,
                             DIAM REAL, VOLUME REAL, RATE REAL, BOUNDARY REAL);
         CREATE TABLE EDGES (EDGE_ID INTEGER, EDGE_NAME TEXT, EDGE_TYPE INTEGER,
                             FROM_NODE TEXT, TO_NODE TEXT, FROM_LEVEL REAL, TO_LEVEL REAL,
                             LEN REAL, DIAM REAL);
         CREATE TABLE EDGE_RESULTS (EDGE_ID INTEGER, TIMESTEP INTEGER, VEL REAL, FLOW REAL, LEVEL REAL);
         CREATE TABLE NODE_RESULTS (NODE_ID INTEGER, TIMESTEP INTEGER, LEVEL REAL, SPILL REAL);
         CREATE TABLE MATERIAL_RESULTS (EDGE_ID INTEGER, TIMESTEP INTEGER, MATERIAL INTEGER,
                                        FLUX REAL, CONC REAL);
         CREATE TABLE HYDROGRAPHS (NODE_ID INTEGER, SERIES BLOB);

         INSERT INTO NODES VALUES (1, 'A', 0, 0.0, 0.0, 5.0, 8.0, 8.5, 1000.0, NULL, NULL, NULL);
         INSERT INTO NODES VALUES (2, 'B', 0, 3.0, 4.0, 4.0, 7.0, 7.5, 1000.0, NULL, NULL, NULL);
         INSERT INTO NODES VALUES (3, 'C', 3, 6.0, 8.0, 3.0, NULL, NULL, NULL, NULL, NULL, 3.2);
         INSERT INTO EDGES VALUES (7, 'P7', 0, 'A', 'B', 5.0, 4.0, NULL, 400.0);
         INSERT INTO EDGES VALUES (8, 'W8', 3, 'B', 'C', 4.0, 3.0, NULL, 500.0);

         INSERT INTO EDGE_RESULTS VALUES (7, {T0}, 1.1, 500.0, 5.2);
         INSERT INTO EDGE_RESULTS VALUES (7, {T1}, 1.3, 700.0, 5.3);
         INSERT INTO EDGE_RESULTS VALUES (8, {T1}, 0.0, 100.0, 4.1);
         INSERT INTO NODE_RESULTS VALUES (3, {T0}, 3.4, 20.0);"
    ))
    .unwrap();
    file
}
