//! Timeline containers.
//!
//! Dense containers hold every entity of a family in pre-sized arrays and are
//! filled by one bulk pass. Sparse containers allocate an entity's arrays the
//! first time that entity is requested.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::quantity::Quantity;
use crate::{ResultsError, ResultsResult};

/// Shared, strictly increasing timestamps (Unix ms).
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis(Arc<[i64]>);

impl TimeAxis {
    pub fn new(times: Vec<i64>) -> ResultsResult<Self> {
        if let Some(i) = times.windows(2).position(|w| w[0] >= w[1]) {
            return Err(ResultsError::UnorderedTimeAxis { index: i + 1 });
        }
        Ok(Self(times.into()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<i64> {
        self.0.get(i).copied()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    /// Index of an exact timestamp.
    pub fn position(&self, t: i64) -> Option<usize> {
        self.0.binary_search(&t).ok()
    }

    /// First index at or after `from` holding `t`, scanning forward.
    ///
    /// Returns `None` if `t` is not on the axis past `from`.
    pub fn seek_from(&self, from: usize, t: i64) -> Option<usize> {
        let rest = self.0.get(from..)?;
        let offset = rest.partition_point(|&x| x < t);
        match rest.get(offset) {
            Some(&x) if x == t => Some(from + offset),
            _ => None,
        }
    }

    /// First and last timestamp.
    pub fn span(&self) -> Option<(i64, i64)> {
        Some((*self.0.first()?, *self.0.last()?))
    }
}

/// One entity's series, one array per quantity, each the axis length.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeries {
    len: usize,
    values: HashMap<Quantity, Vec<f32>>,
}

impl EntitySeries {
    pub fn new(len: usize, quantities: &[Quantity]) -> Self {
        Self {
            len,
            values: quantities.iter().map(|&q| (q, vec![0.0; len])).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set(&mut self, q: Quantity, t: usize, v: f32) -> ResultsResult<()> {
        let len = self.len;
        let arr = self
            .values
            .get_mut(&q)
            .ok_or(ResultsError::MissingQuantity { quantity: q })?;
        let slot = arr.get_mut(t).ok_or(ResultsError::IndexOob {
            what: "time index",
            index: t,
            len,
        })?;
        *slot = v;
        Ok(())
    }

    pub fn get(&self, q: Quantity) -> Option<&[f32]> {
        self.values.get(&q).map(Vec::as_slice)
    }

    pub fn value_at(&self, q: Quantity, t: usize) -> Option<f32> {
        self.values.get(&q)?.get(t).copied()
    }

    pub fn quantities(&self) -> impl Iterator<Item = Quantity> + '_ {
        self.values.keys().copied()
    }
}

/// Pre-sized `entity_count × time_count` arrays per quantity.
#[derive(Debug, Clone)]
pub struct DenseTimelines {
    axis: TimeAxis,
    entity_count: usize,
    data: HashMap<Quantity, Vec<f32>>,
}

impl DenseTimelines {
    pub fn new(axis: TimeAxis, entity_count: usize, quantities: &[Quantity]) -> Self {
        let size = entity_count * axis.len();
        Self {
            data: quantities.iter().map(|&q| (q, vec![0.0; size])).collect(),
            axis,
            entity_count,
        }
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    pub fn quantities(&self) -> impl Iterator<Item = Quantity> + '_ {
        self.data.keys().copied()
    }

    pub fn holds(&self, q: Quantity) -> bool {
        self.data.contains_key(&q)
    }

    fn offset(&self, entity: usize, t: usize) -> ResultsResult<usize> {
        if entity >= self.entity_count {
            return Err(ResultsError::IndexOob {
                what: "entity",
                index: entity,
                len: self.entity_count,
            });
        }
        if t >= self.axis.len() {
            return Err(ResultsError::IndexOob {
                what: "time index",
                index: t,
                len: self.axis.len(),
            });
        }
        Ok(entity * self.axis.len() + t)
    }

    pub fn set(&mut self, entity: usize, q: Quantity, t: usize, v: f32) -> ResultsResult<()> {
        let at = self.offset(entity, t)?;
        let arr = self
            .data
            .get_mut(&q)
            .ok_or(ResultsError::MissingQuantity { quantity: q })?;
        arr[at] = v;
        Ok(())
    }

    pub fn value_at(&self, entity: usize, q: Quantity, t: usize) -> Option<f32> {
        let at = self.offset(entity, t).ok()?;
        self.data.get(&q).map(|arr| arr[at])
    }

    /// One entity's slice of a quantity.
    pub fn series(&self, entity: usize, q: Quantity) -> Option<&[f32]> {
        if entity >= self.entity_count {
            return None;
        }
        let n = self.axis.len();
        self.data
            .get(&q)
            .map(|arr| &arr[entity * n..(entity + 1) * n])
    }
}

/// Lazily populated per-entity series.
///
/// Each slot is written at most once; later initializations are ignored and
/// return the stored series.
#[derive(Debug)]
pub struct SparseTimelines {
    axis: TimeAxis,
    slots: Vec<OnceLock<Arc<EntitySeries>>>,
}

impl SparseTimelines {
    pub fn new(axis: TimeAxis, entity_count: usize) -> Self {
        Self {
            axis,
            slots: (0..entity_count).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn entity_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_initialized(&self, entity: usize) -> bool {
        self.slots.get(entity).is_some_and(|s| s.get().is_some())
    }

    pub fn get(&self, entity: usize) -> Option<Arc<EntitySeries>> {
        self.slots.get(entity)?.get().cloned()
    }

    /// Store an entity's series unless one is already present.
    pub fn initialize(
        &self,
        entity: usize,
        series: EntitySeries,
    ) -> ResultsResult<Arc<EntitySeries>> {
        let slot = self.slots.get(entity).ok_or(ResultsError::IndexOob {
            what: "entity",
            index: entity,
            len: self.slots.len(),
        })?;
        if series.len() != self.axis.len() {
            return Err(ResultsError::LengthMismatch {
                len: series.len(),
                expected: self.axis.len(),
            });
        }
        Ok(slot.get_or_init(|| Arc::new(series)).clone())
    }

    pub fn initialized_count(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }

    pub fn value_at(&self, entity: usize, q: Quantity, t: usize) -> Option<f32> {
        self.slots.get(entity)?.get()?.value_at(q, t)
    }
}

/// Either container behind one read interface.
#[derive(Debug)]
pub enum Timelines {
    Dense(DenseTimelines),
    Sparse(SparseTimelines),
}

impl Timelines {
    pub fn time_axis(&self) -> &TimeAxis {
        match self {
            Timelines::Dense(d) => d.time_axis(),
            Timelines::Sparse(s) => s.time_axis(),
        }
    }

    pub fn entity_count(&self) -> usize {
        match self {
            Timelines::Dense(d) => d.entity_count(),
            Timelines::Sparse(s) => s.entity_count(),
        }
    }

    pub fn value_at(&self, entity: usize, q: Quantity, t: usize) -> Option<f64> {
        match self {
            Timelines::Dense(d) => d.value_at(entity, q, t),
            Timelines::Sparse(s) => s.value_at(entity, q, t),
        }
        .map(f64::from)
    }

    /// Copy of one entity's series for a quantity.
    pub fn series(&self, entity: usize, q: Quantity) -> Option<Vec<f64>> {
        match self {
            Timelines::Dense(d) => d
                .series(entity, q)
                .map(|s| s.iter().copied().map(f64::from).collect()),
            Timelines::Sparse(s) => s
                .get(entity)?
                .get(q)
                .map(|s| s.iter().copied().map(f64::from).collect()),
        }
    }

    pub fn as_sparse(&self) -> Option<&SparseTimelines> {
        match self {
            Timelines::Sparse(s) => Some(s),
            Timelines::Dense(_) => None,
        }
    }
}
