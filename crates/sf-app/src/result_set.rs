//! A loaded network with its timelines.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use sf_core::{LoadMetrics, ManualId};
use sf_graph::{
    BuildType, Capacity, CapacityKind, Edge, EntityFamily, IndexMap, Network,
};
use sf_results::{Quantity, SparseTimelines, TimeAxis, TimedValue, Timelines};
use sf_store::{ResultStore, SchemaVariant};
use tracing::info;

use crate::config::LoaderConfig;
use crate::error::{AppError, AppResult};
use crate::synchronizer::TimelineSynchronizer;
use crate::topology::{CoordinateTransform, LoadReport, TopologyLoader};

/// Network, index and timelines of one result store.
///
/// Families configured as dense are filled on open; the others fill entity
/// by entity as they are requested, from any number of threads.
pub struct ResultSet {
    store: ResultStore,
    network: Network,
    index: IndexMap,
    report: LoadReport,
    edges: Timelines,
    nodes: Timelines,
    materials: Vec<u32>,
}

impl ResultSet {
    pub fn open(
        path: impl AsRef<Path>,
        config: &LoaderConfig,
        metrics: Arc<LoadMetrics>,
    ) -> AppResult<Self> {
        Self::open_with(path, config, metrics, None)
    }

    /// Open, mapping stored coordinates through `transform`.
    pub fn open_with(
        path: impl AsRef<Path>,
        config: &LoaderConfig,
        metrics: Arc<LoadMetrics>,
        transform: Option<CoordinateTransform>,
    ) -> AppResult<Self> {
        config.validate()?;
        let store = ResultStore::open(path, &config.store_options(), metrics)?;

        let mut loader =
            TopologyLoader::new(&store).normalize_orientation(config.normalize_orientation);
        if let Some(transform) = transform {
            loader = loader.with_transform(transform);
        }
        let (network, report) = loader.load()?;
        let index = IndexMap::from_network(&network);

        let (edges, nodes) = {
            let sync = TimelineSynchronizer::new(&store, &network, &index);
            let load = |family: EntityFamily, dense: bool| -> AppResult<Timelines> {
                let axis = sync.time_axis(family)?;
                Ok(if dense {
                    Timelines::Dense(sync.load_dense(family, axis, &config.materials)?)
                } else {
                    Timelines::Sparse(SparseTimelines::new(axis, network.family_len(family)))
                })
            };
            (
                load(EntityFamily::Edges, config.dense_pipes)?,
                load(EntityFamily::Nodes, config.dense_manholes)?,
            )
        };

        info!(
            path = %store.path().display(),
            edges_dense = config.dense_pipes,
            nodes_dense = config.dense_manholes,
            time_steps = edges.time_axis().len(),
            "opened result set"
        );
        Ok(Self {
            store,
            network,
            index,
            report,
            edges,
            nodes,
            materials: config.materials.clone(),
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn index(&self) -> &IndexMap {
        &self.index
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn variant(&self) -> SchemaVariant {
        self.store.variant()
    }

    pub fn metrics(&self) -> &Arc<LoadMetrics> {
        self.store.metrics()
    }

    /// Capacities of one kind, in auto id order.
    pub fn entities_by_kind(&self, kind: CapacityKind) -> Vec<&Capacity> {
        self.network.nodes_of_kind(kind).collect()
    }

    /// Edges of one build type, in auto id order.
    pub fn edges_by_type(&self, build_type: BuildType) -> Vec<&Edge> {
        self.network.edges_of_type(build_type).collect()
    }

    pub fn timelines(&self, family: EntityFamily) -> &Timelines {
        match family {
            EntityFamily::Edges => &self.edges,
            EntityFamily::Nodes => &self.nodes,
        }
    }

    pub fn time_axis(&self, family: EntityFamily) -> &TimeAxis {
        self.timelines(family).time_axis()
    }

    fn slot(&self, family: EntityFamily, manual: ManualId) -> AppResult<usize> {
        let id = match family {
            EntityFamily::Edges => self.index.edge(manual),
            EntityFamily::Nodes => self.index.node(manual),
        };
        id.map(|id| id.slot())
            .map_err(|_| AppError::UnknownEntity { family, id: manual })
    }

    /// Make sure an entity's series is in memory. Dense families always are.
    pub fn ensure_loaded(&self, family: EntityFamily, manual: ManualId) -> AppResult<()> {
        if let Timelines::Sparse(sparse) = self.timelines(family) {
            TimelineSynchronizer::new(&self.store, &self.network, &self.index).load_sparse(
                family,
                manual,
                sparse,
                &self.materials,
            )?;
        }
        Ok(())
    }

    /// Load several sparse series in parallel. Returns each entity's outcome.
    pub fn load_many_sparse(
        &self,
        family: EntityFamily,
        ids: &[ManualId],
    ) -> Vec<(ManualId, AppResult<()>)> {
        let sync = TimelineSynchronizer::new(&self.store, &self.network, &self.index);
        let Timelines::Sparse(sparse) = self.timelines(family) else {
            return ids.iter().map(|&id| (id, self.slot(family, id).map(|_| ()))).collect();
        };
        ids.par_iter()
            .map(|&id| {
                let outcome = sync
                    .load_sparse(family, id, sparse, &self.materials)
                    .map(|_| ());
                (id, outcome)
            })
            .collect()
    }

    /// An entity's full series of one quantity, loading it if needed.
    pub fn timeline_for(
        &self,
        family: EntityFamily,
        manual: ManualId,
        quantity: Quantity,
    ) -> AppResult<Vec<f64>> {
        self.ensure_loaded(family, manual)?;
        let slot = self.slot(family, manual)?;
        self.timelines(family)
            .series(slot, quantity)
            .ok_or_else(|| AppError::InvalidInput(format!("{quantity} is not loaded")))
    }

    /// One value, loading the entity's series if needed.
    ///
    /// `None` when `t` lies past the time axis.
    pub fn value_at(
        &self,
        family: EntityFamily,
        manual: ManualId,
        quantity: Quantity,
        t: usize,
    ) -> AppResult<Option<f64>> {
        self.ensure_loaded(family, manual)?;
        let slot = self.slot(family, manual)?;
        Ok(self.timelines(family).value_at(slot, quantity, t))
    }

    /// A node's stored inflow hydrograph.
    pub fn hydrograph(&self, manual: ManualId) -> AppResult<Option<Vec<TimedValue>>> {
        TimelineSynchronizer::new(&self.store, &self.network, &self.index).load_hydrograph(manual)
    }

    /// Release the store's connections along with the network and timelines.
    pub fn close(self) -> AppResult<()> {
        self.store.close()?;
        Ok(())
    }
}
