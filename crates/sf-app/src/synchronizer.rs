//! Timeline synchronization.
//!
//! Dense loads read one record stream sorted by `(id, time)` for a whole
//! family and merge it against the family's entities sorted by manual id, in
//! a single pass. Sparse loads issue one point query per entity on a
//! connection bound to that entity.
//!
//! Non-conduit edges may report zero velocity with real discharge; velocity
//! is then derived from discharge and profile area, and the water level is
//! set to a nominal value. The dense and sparse paths use different nominal
//! levels.

use std::ops::ControlFlow;
use std::sync::Arc;

use rusqlite::Row;
use sf_core::{Area, ManualId, m3ps, mean_velocity, mg_per_l_to_kg_per_m3};
use sf_graph::{EntityFamily, IndexMap, Network};
use sf_results::{
    DenseTimelines, EntitySeries, Quantity, ResultsResult, SparseTimelines, TimeAxis, TimedValue,
    decode_time_series,
};
use sf_store::{HandleKey, ResultColumns, ResultStore, StoreError, StoreResult};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Water level written alongside a substituted velocity in bulk loads.
pub const DENSE_NOMINAL_LEVEL: f64 = 0.1;
/// Water level written alongside a substituted velocity in per-entity loads.
pub const SPARSE_NOMINAL_LEVEL: f64 = 1.0;

/// Walks rows sorted by `(id, time)` against entities sorted by manual id.
///
/// Entities are `(manual id, slot)` pairs. Each placed row lands at the
/// current entity's slot and the next axis index holding the row's time.
#[derive(Debug)]
pub struct MergeCursor<'a> {
    entities: &'a [(ManualId, usize)],
    axis: &'a TimeAxis,
    entity: usize,
    time: usize,
    placed: u64,
    skipped: u64,
}

impl<'a> MergeCursor<'a> {
    pub fn new(entities: &'a [(ManualId, usize)], axis: &'a TimeAxis) -> Self {
        Self {
            entities,
            axis,
            entity: 0,
            time: 0,
            placed: 0,
            skipped: 0,
        }
    }

    /// Where a row with `id` and `time_ms` belongs, or `None` to skip it.
    pub fn place(&mut self, id: i64, time_ms: i64) -> Option<(usize, usize)> {
        loop {
            let Some(&(manual, slot)) = self.entities.get(self.entity) else {
                self.skipped += 1;
                return None;
            };
            if manual.get() < id {
                self.entity += 1;
                self.time = 0;
                continue;
            }
            if manual.get() > id {
                self.skipped += 1;
                return None;
            }
            return match self.axis.seek_from(self.time, time_ms) {
                Some(t) => {
                    self.time = t + 1;
                    self.placed += 1;
                    Some((slot, t))
                }
                None => {
                    self.skipped += 1;
                    None
                }
            };
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.entity >= self.entities.len()
    }

    /// `Break` once no entity is left for later rows.
    pub fn progress(&self) -> ControlFlow<()> {
        if self.is_exhausted() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    pub fn placed(&self) -> u64 {
        self.placed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// One edge result row in SI units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSample {
    pub velocity: f64,
    pub discharge: f64,
    pub water_level: f64,
}

impl EdgeSample {
    /// Derive velocity from discharge when a structure reports none.
    ///
    /// `area` is `None` for edges that report their own velocity.
    pub fn substitute_velocity(&mut self, area: Option<Area>, nominal_level: f64) {
        let Some(area) = area else {
            return;
        };
        if self.velocity == 0.0 && self.discharge != 0.0 {
            self.velocity = mean_velocity(m3ps(self.discharge), area).value;
            self.water_level = nominal_level;
        }
    }
}

fn real(row: &Row<'_>, i: usize) -> StoreResult<f64> {
    Ok(row.get::<_, Option<f64>>(i)?.unwrap_or(0.0))
}

fn family_quantities(family: EntityFamily, materials: &[u32]) -> Vec<Quantity> {
    match family {
        EntityFamily::Edges => Quantity::EDGE_HYDRAULICS
            .into_iter()
            .chain(
                materials
                    .iter()
                    .flat_map(|&m| [Quantity::MassFlux(m), Quantity::Concentration(m)]),
            )
            .collect(),
        EntityFamily::Nodes => Quantity::NODE_HYDRAULICS.to_vec(),
    }
}

pub struct TimelineSynchronizer<'a> {
    store: &'a ResultStore,
    network: &'a Network,
    index: &'a IndexMap,
}

impl<'a> TimelineSynchronizer<'a> {
    pub fn new(store: &'a ResultStore, network: &'a Network, index: &'a IndexMap) -> Self {
        Self {
            store,
            network,
            index,
        }
    }

    /// Profile area of an edge whose velocity may be substituted.
    fn substitution_area(&self, slot: usize) -> Option<Area> {
        let edge = self.network.edges().get(slot)?;
        if !edge.build_type.substitutes_velocity() {
            return None;
        }
        self.network.edge_profile(edge).map(|p| p.total_area)
    }

    fn result_columns(&self, family: EntityFamily) -> &'static ResultColumns {
        let columns = self.store.columns();
        match family {
            EntityFamily::Edges => &columns.edge_results,
            EntityFamily::Nodes => &columns.node_results,
        }
    }

    fn sorted_slots(&self, family: EntityFamily) -> Vec<(ManualId, usize)> {
        let sorted = match family {
            EntityFamily::Edges => self.index.sorted_edges(),
            EntityFamily::Nodes => self.index.sorted_nodes(),
        };
        sorted.iter().map(|&(m, id)| (m, id.slot())).collect()
    }

    fn slot_of(&self, family: EntityFamily, manual: ManualId) -> AppResult<usize> {
        let id = match family {
            EntityFamily::Edges => self.index.edge(manual),
            EntityFamily::Nodes => self.index.node(manual),
        };
        id.map(|id| id.slot())
            .map_err(|_| AppError::UnknownEntity { family, id: manual })
    }

    /// Timestamps present in the family's result table.
    pub fn time_axis(&self, family: EntityFamily) -> AppResult<TimeAxis> {
        let cols = self.result_columns(family);
        let times = self.store.query_rows(
            HandleKey::Bulk(family),
            cols.table,
            &cols.time_axis_sql(),
            [],
            |row| Ok(row.get::<_, i64>(0)?),
        )?;
        Ok(TimeAxis::new(times)?)
    }

    /// Write one hydraulic row through `set`.
    fn emit_hydraulics(
        &self,
        family: EntityFamily,
        row: &Row<'_>,
        slot: usize,
        nominal_level: f64,
        mut set: impl FnMut(Quantity, f64) -> ResultsResult<()>,
    ) -> StoreResult<()> {
        let scale = self.store.columns().discharge_scale;
        match family {
            EntityFamily::Edges => {
                let mut sample = EdgeSample {
                    velocity: real(row, 2)?,
                    discharge: real(row, 3)? * scale,
                    water_level: real(row, 4)?,
                };
                let area = self.substitution_area(slot);
                sample.substitute_velocity(area, nominal_level);
                set(Quantity::Velocity, sample.velocity)?;
                set(Quantity::Discharge, sample.discharge)?;
                set(Quantity::WaterLevel, sample.water_level)?;
            }
            EntityFamily::Nodes => {
                set(Quantity::WaterLevel, real(row, 2)?)?;
                set(Quantity::Spill, real(row, 3)? * scale)?;
            }
        }
        Ok(())
    }

    fn emit_material(
        &self,
        material: u32,
        row: &Row<'_>,
        mut set: impl FnMut(Quantity, f64) -> ResultsResult<()>,
    ) -> StoreResult<()> {
        let scale = self.store.columns().discharge_scale;
        set(Quantity::MassFlux(material), real(row, 2)? * scale)?;
        set(
            Quantity::Concentration(material),
            mg_per_l_to_kg_per_m3(real(row, 3)?),
        )?;
        Ok(())
    }

    /// Bulk-load every entity of a family in one pass per result table.
    ///
    /// `materials` only applies to edges.
    pub fn load_dense(
        &self,
        family: EntityFamily,
        axis: TimeAxis,
        materials: &[u32],
    ) -> AppResult<DenseTimelines> {
        let entities = self.sorted_slots(family);
        let quantities = family_quantities(family, materials);
        let mut dense =
            DenseTimelines::new(axis.clone(), self.network.family_len(family), &quantities);

        let cols = self.result_columns(family);
        let mut cursor = MergeCursor::new(&entities, &axis);
        self.store.for_each_row(
            HandleKey::Bulk(family),
            cols.table,
            &cols.bulk_sql(),
            [],
            |row| {
                if let Some((slot, t)) = cursor.place(row.get(0)?, row.get(1)?) {
                    self.emit_hydraulics(family, row, slot, DENSE_NOMINAL_LEVEL, |q, v| {
                        dense.set(slot, q, t, v as f32)
                    })?;
                }
                Ok(cursor.progress())
            },
        )?;
        self.finish_pass(cols.table, &cursor);

        if family == EntityFamily::Edges {
            let mcols = &self.store.columns().materials;
            for &material in materials {
                let mut cursor = MergeCursor::new(&entities, &axis);
                self.store.for_each_row(
                    HandleKey::Bulk(family),
                    mcols.table,
                    &mcols.bulk_sql(),
                    [i64::from(material)],
                    |row| {
                        if let Some((slot, t)) = cursor.place(row.get(0)?, row.get(1)?) {
                            self.emit_material(material, row, |q, v| {
                                dense.set(slot, q, t, v as f32)
                            })?;
                        }
                        Ok(cursor.progress())
                    },
                )?;
                self.finish_pass(mcols.table, &cursor);
            }
        }
        Ok(dense)
    }

    fn finish_pass(&self, table: &str, cursor: &MergeCursor<'_>) {
        self.store.metrics().record_skipped_rows(cursor.skipped());
        debug!(
            table,
            placed = cursor.placed(),
            skipped = cursor.skipped(),
            "merged record stream"
        );
    }

    /// Load one entity's series unless it is already present.
    ///
    /// Holds the entity's connection from the presence check to the store,
    /// so a second caller for the same entity waits and then finds the
    /// series without querying.
    pub fn load_sparse(
        &self,
        family: EntityFamily,
        manual: ManualId,
        timelines: &SparseTimelines,
        materials: &[u32],
    ) -> AppResult<Arc<EntitySeries>> {
        let slot = self.slot_of(family, manual)?;
        if let Some(series) = timelines.get(slot) {
            return Ok(series);
        }

        let session = self.store.session(HandleKey::Entity(family, manual))?;
        if let Some(series) = timelines.get(slot) {
            return Ok(series);
        }

        let axis = timelines.time_axis();
        let quantities = family_quantities(family, materials);
        let mut series = EntitySeries::new(axis.len(), &quantities);
        let mut skipped = 0_u64;

        let cols = self.result_columns(family);
        let mut next = 0;
        session.for_each_row(cols.table, &cols.entity_sql(), [manual.get()], |row| {
            let Some(t) = axis.seek_from(next, row.get(1)?) else {
                skipped += 1;
                return Ok(ControlFlow::Continue(()));
            };
            next = t + 1;
            self.emit_hydraulics(family, row, slot, SPARSE_NOMINAL_LEVEL, |q, v| {
                series.set(q, t, v as f32)
            })?;
            Ok(ControlFlow::Continue(()))
        })?;

        if family == EntityFamily::Edges {
            let mcols = &self.store.columns().materials;
            for &material in materials {
                let mut next = 0;
                session.for_each_row(
                    mcols.table,
                    &mcols.entity_sql(),
                    [manual.get(), i64::from(material)],
                    |row| {
                        let Some(t) = axis.seek_from(next, row.get(1)?) else {
                            skipped += 1;
                            return Ok(ControlFlow::Continue(()));
                        };
                        next = t + 1;
                        self.emit_material(material, row, |q, v| series.set(q, t, v as f32))?;
                        Ok(ControlFlow::Continue(()))
                    },
                )?;
            }
        }

        self.store.metrics().record_skipped_rows(skipped);
        let stored = timelines.initialize(slot, series)?;
        drop(session);
        debug!(?family, %manual, skipped, "loaded entity series");
        Ok(stored)
    }

    /// A node's stored inflow hydrograph, if it has one.
    pub fn load_hydrograph(&self, manual: ManualId) -> AppResult<Option<Vec<TimedValue>>> {
        self.slot_of(EntityFamily::Nodes, manual)?;
        let cols = &self.store.columns().hydrographs;
        let session = self
            .store
            .session(HandleKey::Entity(EntityFamily::Nodes, manual))?;
        let Some(bytes) = session.query_blob(cols.table, &cols.entity_sql(), [manual.get()])?
        else {
            return Ok(None);
        };
        let values = decode_time_series(&bytes).map_err(|e| StoreError::MalformedBlob {
            entity: format!("hydrograph of node {manual}"),
            message: e.to_string(),
        })?;
        Ok(Some(values))
    }
}
