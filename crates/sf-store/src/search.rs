//! Id lookup in feature tables that only offer positional access.
//!
//! Features sit at positions `1..=N` with ids non-decreasing by position, but
//! ids have gaps, so position and id differ. The search keeps an exclusive
//! bracket `(lower, upper)` of positions with the ids seen there and probes by
//! interpolation, falling back to fixed fractional steps when a guess leaves
//! the bracket. Probing stops after `max_tries` reads.

use sf_core::LoadMetrics;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::geodata::{Feature, FeatureTable};

/// Below this id distance the next guess interpolates; above it the guess
/// moves by the raw id difference.
const INTERPOLATE_BELOW: i64 = 200;
/// Brackets narrower than this are walked one position at a time.
const NARROW_BRACKET: i64 = 10;
const FALLBACK_FRACTION: f64 = 0.3;

pub const DEFAULT_MAX_TRIES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexlessTableSearch {
    id_field: usize,
    max_id: i64,
    max_tries: usize,
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    pos: i64,
    id: i64,
}

impl IndexlessTableSearch {
    /// `id_field` is the field index holding the feature id; `max_id` the
    /// highest id the table can hold.
    pub fn new(id_field: usize, max_id: i64) -> Self {
        Self {
            id_field,
            max_id,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }

    pub fn with_max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    pub fn id_field(&self) -> usize {
        self.id_field
    }

    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    pub fn max_tries(&self) -> usize {
        self.max_tries
    }

    /// Locate the feature holding `target`.
    ///
    /// Fails with [`StoreError::NotFound`] when the id is out of range, the
    /// bracket collapses, or the probe budget runs out.
    pub fn find<T: FeatureTable + ?Sized>(
        &self,
        table: &mut T,
        target: i64,
        metrics: &LoadMetrics,
    ) -> StoreResult<Feature> {
        let n = table.feature_count() as i64;
        if n == 0 || target < 0 || target > self.max_id {
            return Err(StoreError::NotFound { id: target });
        }

        let mut lower = Bound { pos: 0, id: 0 };
        let mut upper = Bound {
            pos: n + 1,
            id: self.max_id + 1,
        };
        let mut guess = first_guess(target, n, self.max_id);

        for probe in 1..=self.max_tries {
            let id = self.read_id(table, guess)?;
            if id == target {
                metrics.record_probes(probe as u64);
                return table.read_feature(guess as usize);
            }

            let (next, id_above) = if id > target {
                upper = Bound { pos: guess, id };
                let diff = id - target;
                let next = if diff < INTERPOLATE_BELOW {
                    interpolate(target, lower, upper)
                } else {
                    guess - diff
                };
                (next, true)
            } else {
                lower = Bound { pos: guess, id };
                let diff = target - id;
                let next = if diff < INTERPOLATE_BELOW {
                    interpolate(target, lower, upper)
                } else {
                    guess + diff
                };
                (next, false)
            };

            let width = upper.pos - lower.pos;
            if width <= 1 {
                metrics.record_probes(probe as u64);
                return Err(StoreError::NotFound { id: target });
            }

            guess = if next > lower.pos && next < upper.pos {
                next
            } else {
                fallback(lower.pos, upper.pos, id_above)
            };
        }

        metrics.record_probes(self.max_tries as u64);
        debug!(target, tries = self.max_tries, "indexless search exhausted its probe budget");
        Err(StoreError::NotFound { id: target })
    }

    fn read_id<T: FeatureTable + ?Sized>(&self, table: &mut T, pos: i64) -> StoreResult<i64> {
        let position = pos as usize;
        table
            .read_field_value(position, self.id_field)?
            .as_i64()
            .ok_or_else(|| StoreError::FieldType {
                position,
                field: self.id_field,
                message: "feature id is not an integer".to_string(),
            })
    }
}

fn first_guess(target: i64, n: i64, max_id: i64) -> i64 {
    if max_id <= 0 {
        return 1;
    }
    let guess = (target as f64 * n as f64 / max_id as f64).round() as i64;
    guess.clamp(1, n)
}

fn interpolate(target: i64, lower: Bound, upper: Bound) -> i64 {
    let span = upper.id - lower.id;
    if span <= 0 {
        return lower.pos + (upper.pos - lower.pos) / 2;
    }
    let share = (target - lower.id) as f64 / span as f64;
    lower.pos + (share * (upper.pos - lower.pos) as f64).round() as i64
}

/// A guess strictly inside `(lower, upper)`. Requires `upper - lower >= 2`.
fn fallback(lower: i64, upper: i64, id_above: bool) -> i64 {
    let width = upper - lower;
    let step = (FALLBACK_FRACTION * width as f64) as i64;
    let guess = match (id_above, width < NARROW_BRACKET) {
        (true, true) => upper - 1,
        (true, false) => lower + step,
        (false, true) => lower + 1,
        (false, false) => upper - step,
    };
    guess.clamp(lower + 1, upper - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodata::{FieldValue, MemoryFeatureTable};

    fn even_ids(n: usize) -> MemoryFeatureTable {
        MemoryFeatureTable::new(
            (0..n)
                .map(|i| vec![FieldValue::Integer(2 * i as i64), FieldValue::Real(i as f64)])
                .collect(),
        )
    }

    #[test]
    fn finds_last_feature() {
        let mut table = even_ids(1000);
        let metrics = LoadMetrics::new();
        let search = IndexlessTableSearch::new(0, 1998);
        let feature = search.find(&mut table, 1998, &metrics).unwrap();
        assert_eq!(feature.index(), 999);
        assert!(metrics.snapshot().search_probes <= DEFAULT_MAX_TRIES as u64);
    }

    #[test]
    fn gap_ids_are_not_found() {
        let mut table = even_ids(1000);
        let metrics = LoadMetrics::new();
        let search = IndexlessTableSearch::new(0, 1998);
        assert!(search.find(&mut table, 1999, &metrics).unwrap_err().is_not_found());
        assert!(search.find(&mut table, 1001, &metrics).unwrap_err().is_not_found());
        assert!(search.find(&mut table, -4, &metrics).unwrap_err().is_not_found());
    }

    #[test]
    fn every_present_id_is_found() {
        let mut table = even_ids(300);
        let metrics = LoadMetrics::new();
        let search = IndexlessTableSearch::new(0, 598);
        for i in 0..300 {
            let feature = search.find(&mut table, 2 * i, &metrics).unwrap();
            assert_eq!(feature.index(), i as usize);
        }
    }

    #[test]
    fn probe_budget_bounds_reads() {
        let mut table = even_ids(1000);
        let metrics = LoadMetrics::new();
        let search = IndexlessTableSearch::new(0, 1998).with_max_tries(1);
        // first guess lands on id 398
        assert!(search.find(&mut table, 400, &metrics).is_err());
        assert_eq!(table.reads(), 1);
    }

    #[test]
    fn empty_table() {
        let mut table = MemoryFeatureTable::new(Vec::new());
        let search = IndexlessTableSearch::new(0, 10);
        assert!(search.find(&mut table, 3, &LoadMetrics::new()).is_err());
    }

    #[test]
    fn fallback_stays_inside() {
        assert_eq!(fallback(0, 5, true), 4);
        assert_eq!(fallback(0, 5, false), 1);
        assert_eq!(fallback(0, 100, true), 30);
        assert_eq!(fallback(0, 100, false), 70);
        assert_eq!(fallback(3, 5, true), 4);
    }
}
