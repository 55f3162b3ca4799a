mod common;

use std::sync::Arc;

use common::{T0, T1, assert_close, current_store, legacy_store};
use sf_app::{
    AppError, CoordinateTransform, LoaderConfig, ResultSet, TimelineSynchronizer, TopologyLoader,
};
use sf_core::{LoadMetrics, ManualId};
use sf_graph::{BuildType, CapacityKind, EntityFamily, IndexMap};
use sf_results::{Quantity, TimedValue};
use sf_store::{ResultStore, SchemaVariant, StoreError, StoreOptions};

fn open(path: &std::path::Path, config: &LoaderConfig) -> ResultSet {
    ResultSet::open(path, config, Arc::new(LoadMetrics::new())).unwrap()
}

fn sparse_config() -> LoaderConfig {
    LoaderConfig::default().on_demand()
}

fn edge_by_manual(set: &ResultSet, id: i64) -> &sf_graph::Edge {
    let auto = set.index().edge(ManualId(id)).unwrap();
    set.network().edge(auto).unwrap()
}

#[test]
fn current_store_topology() {
    let file = current_store();
    let set = open(file.path(), &LoaderConfig::default());

    assert_eq!(set.variant(), SchemaVariant::Current);
    assert_eq!(set.entities_by_kind(CapacityKind::Manhole).len(), 3);
    assert_eq!(set.entities_by_kind(CapacityKind::Outlet).len(), 1);
    assert_eq!(set.edges_by_type(BuildType::Pipe).len(), 2);
    assert_eq!(set.edges_by_type(BuildType::Pump).len(), 1);

    let skipped: Vec<i64> = set.report().skipped_edges().map(|s| s.manual_id.get()).collect();
    assert_eq!(skipped, vec![20]);
    assert!(set.report().missing_tables.iter().any(|t| t == "InfiltrationNode"));
    assert_eq!(set.metrics().snapshot().entities_skipped, 1);

    let mh2 = set.index().node(ManualId(2)).unwrap();
    let position = set.network().node(mh2).unwrap().position();
    assert_close(position.x, 30.0);
    assert_close(position.y, 40.0);
}

#[test]
fn uphill_edge_is_swapped_and_lengths_default() {
    let file = current_store();
    let set = open(file.path(), &LoaderConfig::default());

    let p30 = edge_by_manual(&set, 30);
    assert!(p30.swapped);
    assert!(p30.upper.height >= p30.lower.height);
    assert_close(p30.upper.height, 9.0);
    assert_eq!(p30.upper.node, set.index().node(ManualId(2)).unwrap());
    assert_close(p30.length, 50.0);

    assert!(!edge_by_manual(&set, 10).swapped);
    assert_close(edge_by_manual(&set, 10).length, 50.0);
    assert_close(edge_by_manual(&set, 5).length, 1.0);
}

#[test]
fn orientation_is_kept_when_normalization_is_off() {
    let file = current_store();
    let config = LoaderConfig {
        normalize_orientation: false,
        ..LoaderConfig::default()
    };
    let set = open(file.path(), &config);

    let p30 = edge_by_manual(&set, 30);
    assert!(!p30.swapped);
    assert!(p30.upper.height < p30.lower.height);
    assert!(!set.network().is_normalized());
}

#[test]
fn dense_edges_merge_sorted_stream() {
    let file = current_store();
    let set = open(file.path(), &LoaderConfig::default());

    assert_eq!(set.time_axis(EntityFamily::Edges).as_slice(), &[T0, T1]);

    let discharge = set
        .timeline_for(EntityFamily::Edges, ManualId(10), Quantity::Discharge)
        .unwrap();
    assert_close(discharge[0], 0.5);
    assert_close(discharge[1], 0.6);

    // Pipe 30 has no row at the second step.
    let level = set
        .timeline_for(EntityFamily::Edges, ManualId(30), Quantity::WaterLevel)
        .unwrap();
    assert_close(level[0], 8.5);
    assert_close(level[1], 0.0);

    assert_eq!(
        set.value_at(EntityFamily::Edges, ManualId(10), Quantity::Velocity, 5)
            .unwrap(),
        None
    );
    // The row of the skipped pipe 20 and the first orphan 99.
    assert_eq!(set.metrics().snapshot().rows_skipped, 2);
}

#[test]
fn dense_merge_stops_after_last_entity() {
    let file = current_store();
    let metrics = Arc::new(LoadMetrics::new());
    let store = ResultStore::open(file.path(), &StoreOptions::default(), metrics.clone()).unwrap();
    let (network, _) = TopologyLoader::new(&store).load().unwrap();
    let index = IndexMap::from_network(&network);
    let sync = TimelineSynchronizer::new(&store, &network, &index);
    let axis = sync.time_axis(EntityFamily::Edges).unwrap();

    let before = metrics.snapshot();
    let dense = sync.load_dense(EntityFamily::Edges, axis, &[]).unwrap();
    let pass = metrics.snapshot().since(&before);

    // Eight rows are stored; the second row of orphan 99 is never read.
    assert_eq!(pass.queries, 1);
    assert_eq!(pass.rows_scanned, 7);
    assert_eq!(pass.rows_skipped, 2);
    assert_eq!(dense.entity_count(), 3);
}

#[test]
fn dense_pump_velocity_is_substituted() {
    let file = current_store();
    let set = open(file.path(), &LoaderConfig::default());

    let velocity = set
        .timeline_for(EntityFamily::Edges, ManualId(5), Quantity::Velocity)
        .unwrap();
    let area = std::f64::consts::PI * 0.2 * 0.2 / 4.0;
    assert_close(velocity[0], 0.2 / area);
    assert_close(velocity[1], 0.0);

    let level = set
        .timeline_for(EntityFamily::Edges, ManualId(5), Quantity::WaterLevel)
        .unwrap();
    assert_close(level[0], 0.1);
    assert_close(level[1], 8.2);

    // Pipes report their own velocity.
    let pipe = set
        .value_at(EntityFamily::Edges, ManualId(10), Quantity::Velocity, 0)
        .unwrap();
    assert_close(pipe.unwrap(), 1.0);
}

#[test]
fn sparse_pump_uses_sparse_nominal_level() {
    let file = current_store();
    let set = open(file.path(), &sparse_config());

    let level = set
        .timeline_for(EntityFamily::Edges, ManualId(5), Quantity::WaterLevel)
        .unwrap();
    assert_close(level[0], 1.0);
    assert_close(level[1], 8.2);
}

#[test]
fn sparse_load_is_idempotent() {
    let file = current_store();
    let set = open(file.path(), &sparse_config());

    let before = set.metrics().snapshot();
    let first = set
        .timeline_for(EntityFamily::Edges, ManualId(10), Quantity::Discharge)
        .unwrap();
    let after_first = set.metrics().snapshot();
    assert_eq!(after_first.queries - before.queries, 1);

    let second = set
        .timeline_for(EntityFamily::Edges, ManualId(10), Quantity::Discharge)
        .unwrap();
    assert_eq!(set.metrics().snapshot().queries, after_first.queries);
    assert_eq!(first, second);
    assert_close(second[1], 0.6);
}

#[test]
fn sparse_family_starts_empty() {
    let file = current_store();
    let set = open(file.path(), &sparse_config());

    let sparse = set.timelines(EntityFamily::Nodes).as_sparse().unwrap();
    assert_eq!(sparse.initialized_count(), 0);

    let spill = set
        .value_at(EntityFamily::Nodes, ManualId(3), Quantity::Spill, 1)
        .unwrap();
    assert_close(spill.unwrap(), 0.003);
    assert_eq!(sparse.initialized_count(), 1);
}

#[test]
fn load_many_sparse_reports_each_entity() {
    let file = current_store();
    let set = open(file.path(), &sparse_config());

    let ids = [ManualId(5), ManualId(10), ManualId(30), ManualId(77)];
    let outcomes = set.load_many_sparse(EntityFamily::Edges, &ids);
    assert_eq!(outcomes.len(), 4);
    for (id, outcome) in &outcomes {
        if id.get() == 77 {
            assert!(matches!(outcome, Err(AppError::UnknownEntity { .. })));
        } else {
            assert!(outcome.is_ok(), "{id}: {outcome:?}");
        }
    }

    let sparse = set.timelines(EntityFamily::Edges).as_sparse().unwrap();
    assert_eq!(sparse.initialized_count(), 3);

    let queries = set.metrics().queries();
    set.load_many_sparse(EntityFamily::Edges, &ids[..3]);
    assert_eq!(set.metrics().queries(), queries);
}

#[test]
fn unknown_entity_is_reported() {
    let file = current_store();
    let set = open(file.path(), &LoaderConfig::default());
    let err = set
        .timeline_for(EntityFamily::Nodes, ManualId(404), Quantity::WaterLevel)
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::UnknownEntity {
            family: EntityFamily::Nodes,
            ..
        }
    ));
}

#[test]
fn materials_are_converted() {
    let file = current_store();
    for config in [
        LoaderConfig {
            materials: vec![1],
            ..LoaderConfig::default()
        },
        LoaderConfig {
            materials: vec![1],
            ..sparse_config()
        },
    ] {
        let set = open(file.path(), &config);
        let flux = set
            .timeline_for(EntityFamily::Edges, ManualId(10), Quantity::MassFlux(1))
            .unwrap();
        assert_close(flux[0], 2.0);
        assert_close(flux[1], 3.0);

        let conc = set
            .timeline_for(EntityFamily::Edges, ManualId(10), Quantity::Concentration(1))
            .unwrap();
        assert_close(conc[0], 0.15);
        assert_close(conc[1], 0.2);

        assert!(
            set.timeline_for(EntityFamily::Edges, ManualId(10), Quantity::MassFlux(2))
                .is_err()
        );
    }
}

#[test]
fn hydrographs_decode_or_fail() {
    let file = current_store();
    let set = open(file.path(), &LoaderConfig::default());

    let series = set.hydrograph(ManualId(1)).unwrap().unwrap();
    assert_eq!(
        series,
        vec![TimedValue::new(T0, 1.5), TimedValue::new(T1, 2.25)]
    );

    let err = set.hydrograph(ManualId(2)).unwrap_err();
    assert!(matches!(
        err.as_store(),
        Some(StoreError::MalformedBlob { .. })
    ));

    assert_eq!(set.hydrograph(ManualId(3)).unwrap(), None);
}

#[test]
fn hydrograph_read_skips_timeline_loads() {
    let file = current_store();
    let metrics = Arc::new(LoadMetrics::new());
    let set = ResultSet::open(file.path(), &sparse_config(), metrics.clone()).unwrap();

    let before = metrics.snapshot();
    let series = set.hydrograph(ManualId(1)).unwrap().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(metrics.snapshot().since(&before).queries, 1);

    for family in [EntityFamily::Edges, EntityFamily::Nodes] {
        let sparse = set.timelines(family).as_sparse().unwrap();
        assert_eq!(sparse.initialized_count(), 0);
    }
}

#[test]
fn legacy_store_scales_discharge() {
    let file = legacy_store();
    let set = open(file.path(), &LoaderConfig::default());

    assert_eq!(set.variant(), SchemaVariant::Legacy);
    assert_eq!(set.entities_by_kind(CapacityKind::Manhole).len(), 2);
    assert_eq!(set.entities_by_kind(CapacityKind::Outlet).len(), 1);
    assert_eq!(set.edges_by_type(BuildType::Weir).len(), 1);
    assert!(set.report().is_clean());

    let discharge = set
        .timeline_for(EntityFamily::Edges, ManualId(7), Quantity::Discharge)
        .unwrap();
    assert_close(discharge[0], 0.5);
    assert_close(discharge[1], 0.7);

    let spill = set
        .value_at(EntityFamily::Nodes, ManualId(3), Quantity::Spill, 0)
        .unwrap();
    assert_close(spill.unwrap(), 0.02);

    let weir = set
        .timeline_for(EntityFamily::Edges, ManualId(8), Quantity::Velocity)
        .unwrap();
    let area = std::f64::consts::PI * 0.5 * 0.5 / 4.0;
    assert_close(weir[1], 0.1 / area);
    assert_close(edge_by_manual(&set, 8).length, 0.5);
}

#[test]
fn forced_schema_is_not_probed() {
    let file = current_store();
    let config = LoaderConfig {
        schema: Some(SchemaVariant::Legacy),
        ..LoaderConfig::default()
    };
    let err = ResultSet::open(file.path(), &config, Arc::new(LoadMetrics::new()))
        .err()
        .unwrap();
    assert!(matches!(
        err.as_store(),
        Some(StoreError::SchemaMismatch { .. })
    ));
}

#[test]
fn coordinates_pass_through_transform() {
    let file = current_store();
    let transform: CoordinateTransform = Box::new(|x: f64, y: f64| (x + 1000.0, y * 2.0));
    let set = ResultSet::open_with(
        file.path(),
        &LoaderConfig::default(),
        Arc::new(LoadMetrics::new()),
        Some(transform),
    )
    .unwrap();
    let mh2 = set.index().node(ManualId(2)).unwrap();
    let position = set.network().node(mh2).unwrap().position();
    assert_close(position.x, 1030.0);
    assert_close(position.y, 80.0);
}

#[test]
fn closed_set_releases_store() {
    let file = current_store();
    let set = open(file.path(), &sparse_config());
    set.close().unwrap();
}

#[test]
fn concurrent_requests_for_one_entity_query_once() {
    let file = current_store();
    let set = open(file.path(), &sparse_config());
    let before = set.metrics().queries();

    let series: Vec<Vec<f64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    set.timeline_for(EntityFamily::Edges, ManualId(10), Quantity::Velocity)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(set.metrics().queries() - before, 1);
    assert!(series.windows(2).all(|w| w[0] == w[1]));
}
