//! Offset-only SQLite feature tables and id search over them.

use std::sync::Arc;

use proptest::prelude::*;
use rusqlite::Connection;
use sf_core::LoadMetrics;
use sf_store::{
    FeatureTable, FieldValue, GeodataStore, IndexlessTableSearch, MemoryFeatureTable,
    SqliteFeatureTable,
};

fn surface_db(ids: &[i64]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();
    conn.execute_batch("CREATE TABLE Surface (TriangleId INTEGER, H0 REAL, H1 REAL, H2 REAL);")
        .unwrap();
    let mut insert = conn
        .prepare("INSERT INTO Surface VALUES (?1, ?2, ?3, ?4)")
        .unwrap();
    for &id in ids {
        let base = id as f64 / 10.0;
        insert
            .execute((id, base, base + 1.0, base + 2.0))
            .unwrap();
    }
    file
}

#[test]
fn sqlite_table_reads_by_position() {
    let file = surface_db(&[1, 4, 9]);
    let mut table = SqliteFeatureTable::open(file.path(), "Surface").unwrap();
    assert_eq!(table.feature_count(), 3);
    assert_eq!(table.columns()[0], "TriangleId");
    assert_eq!(table.read_field_value(2, 0).unwrap(), FieldValue::Integer(4));
    let feature = table.read_feature(3).unwrap();
    assert_eq!(feature.fields.len(), 4);
    assert_eq!(feature.field(1), Some(&FieldValue::Real(0.9)));
    assert!(table.read_field_value(4, 0).is_err());
}

#[test]
fn geodata_store_finds_triangles() {
    let ids: Vec<i64> = (0..400).filter(|i| i % 3 != 1).collect();
    let max_id = *ids.last().unwrap();
    let file = surface_db(&ids);
    let store = GeodataStore::open_sqlite(
        file.path(),
        "Surface",
        "TriangleId",
        &["H0", "H1", "H2"],
        max_id,
        Arc::new(LoadMetrics::new()),
    )
    .unwrap();

    assert_eq!(store.series_len(), 3);
    let series = store.series(300).unwrap();
    assert_eq!(series, vec![30.0, 31.0, 32.0]);
    assert!(store.series(301).unwrap_err().is_not_found());
}

#[test]
fn unknown_value_column_is_schema_mismatch() {
    let file = surface_db(&[1]);
    let result = GeodataStore::open_sqlite(
        file.path(),
        "Surface",
        "TriangleId",
        &["Depth"],
        1,
        Arc::new(LoadMetrics::new()),
    );
    assert!(matches!(
        result.err(),
        Some(sf_store::StoreError::SchemaMismatch { .. })
    ));
}

proptest! {
    #[test]
    fn present_ids_are_found(gaps in prop::collection::vec(1_i64..6, 1..150)) {
        let ids: Vec<i64> = gaps
            .iter()
            .scan(0_i64, |acc, g| { *acc += g; Some(*acc) })
            .collect();
        let max_id = *ids.last().unwrap();
        let mut table = MemoryFeatureTable::new(
            ids.iter().map(|&id| vec![FieldValue::Integer(id)]).collect(),
        );
        let search = IndexlessTableSearch::new(0, max_id);
        let metrics = LoadMetrics::new();
        for (i, &id) in ids.iter().enumerate() {
            let feature = search.find(&mut table, id, &metrics).unwrap();
            prop_assert_eq!(feature.index(), i);
        }
    }

    #[test]
    fn absent_ids_are_not_found(gaps in prop::collection::vec(2_i64..6, 1..150)) {
        let ids: Vec<i64> = gaps
            .iter()
            .scan(0_i64, |acc, g| { *acc += g; Some(*acc) })
            .collect();
        let max_id = *ids.last().unwrap();
        let mut table = MemoryFeatureTable::new(
            ids.iter().map(|&id| vec![FieldValue::Integer(id)]).collect(),
        );
        let search = IndexlessTableSearch::new(0, max_id);
        let metrics = LoadMetrics::new();
        for &id in &ids {
            let err = search.find(&mut table, id - 1, &metrics).unwrap_err();
            prop_assert!(err.is_not_found());
        }
    }
}
